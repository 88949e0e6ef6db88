//! # Customer Synchronization Orchestrator
//!
//! Creates a customer, then its primary address under the new customer id.
//! Either step failing fails the run; a created customer is not rolled back.

use std::sync::Arc;

use super::remote_caller::RemoteCaller;
use crate::constants::{job_types, operations};
use crate::error::Result;
use crate::log_sync;
use crate::models::{CustomerRecord, CustomerSyncResult};
use crate::queue::JobContext;
use crate::remote::response::extract_data_id;
use crate::remote::{AddressPayload, CachedEndpointResolver, CustomerPayload};

#[derive(Debug, Clone)]
pub struct CustomerSyncOrchestrator {
    caller: RemoteCaller,
    endpoints: Arc<CachedEndpointResolver>,
}

impl CustomerSyncOrchestrator {
    pub fn new(caller: RemoteCaller, endpoints: Arc<CachedEndpointResolver>) -> Self {
        Self { caller, endpoints }
    }

    pub async fn synchronize(
        &self,
        ctx: &JobContext,
        customer: CustomerRecord,
    ) -> Result<CustomerSyncResult> {
        let name = customer.require_name()?.to_string();
        let endpoints = self.endpoints.endpoints().await?;
        let request = serde_json::to_value(&customer)?;

        let result = self
            .caller
            .tracked(
                ctx,
                job_types::CUSTOMER_SYNC,
                operations::CREATE_CUSTOMER,
                &request,
                |ctx| async move {
                    let customer_id = self
                        .caller
                        .upsert(
                            &ctx,
                            operations::CREATE_CUSTOMER,
                            &endpoints.create_customer,
                            &CustomerPayload::from(&customer),
                            extract_data_id,
                        )
                        .await?;

                    let address_id = self
                        .caller
                        .upsert(
                            &ctx,
                            operations::CREATE_ADDRESS,
                            &endpoints.create_address,
                            &AddressPayload::primary_for(customer_id, &customer.primary_address),
                            extract_data_id,
                        )
                        .await?;

                    Ok(CustomerSyncResult {
                        customer_id,
                        address_id,
                    })
                },
            )
            .await?;

        log_sync!(info, "CUSTOMER_SYNCED",
            name: name,
            customer_id: result.customer_id,
            address_id: result.address_id
        );
        Ok(result)
    }
}
