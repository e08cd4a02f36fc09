//! Customer registration.

use common::CustomerId;
use domain::{Customer, NewCustomer};
use store::{CustomerStore, StoreError};

use crate::error::CustomerError;

/// Find-or-create access to customer records.
pub struct CustomerService<S> {
    store: S,
}

impl<S: CustomerStore> CustomerService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the customer registered under `email`, creating one if none
    /// exists. Emails are compared after trimming and lower-casing.
    #[tracing::instrument(skip_all)]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        contact_number: Option<String>,
    ) -> Result<Customer, CustomerError> {
        let new = NewCustomer::new(name, email, contact_number);
        if new.name.is_empty() {
            return Err(CustomerError::MissingName);
        }
        if !is_plausible_email(&new.email) {
            return Err(CustomerError::InvalidEmail(email.to_string()));
        }

        if let Some(existing) = self.store.find_customer_by_email(&new.email).await? {
            tracing::debug!(customer_id = %existing.id, "customer already registered");
            return Ok(existing);
        }

        let email = new.email.clone();
        match self.store.insert_customer(new).await {
            Ok(customer) => {
                tracing::info!(customer_id = %customer.id, "customer registered");
                Ok(customer)
            }
            // Registered concurrently under the same email.
            Err(StoreError::Conflict(_)) => self
                .store
                .find_customer_by_email(&email)
                .await?
                .ok_or_else(|| CustomerError::Store(StoreError::Conflict(email))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: CustomerId) -> Result<Option<Customer>, CustomerError> {
        Ok(self.store.get_customer(id).await?)
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !email.contains(' '),
        None => false,
    }
}
