use sea_orm::{ConnectionTrait, prelude::*};
use uuid::Uuid;

use crate::{Customer, EngineError, ResultEngine, customers};

use super::{Engine, normalize_required_text};

impl Engine {
    /// Register a new customer with a zero opening balance.
    pub async fn new_customer(&self, name: &str) -> ResultEngine<Customer> {
        let name = normalize_required_text(name, "customer name")?;
        let customer = Customer::new(name);
        customers::ActiveModel::from(&customer)
            .insert(&self.database)
            .await?;
        Ok(customer)
    }

    /// Return a customer by id.
    pub async fn customer(&self, customer_id: Uuid) -> ResultEngine<Customer> {
        let model = self.require_customer(&self.database, customer_id).await?;
        Customer::try_from(model)
    }

    pub(crate) async fn require_customer<C: ConnectionTrait>(
        &self,
        conn: &C,
        customer_id: Uuid,
    ) -> ResultEngine<customers::Model> {
        customers::Entity::find_by_id(customer_id.to_string())
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("customer {customer_id}")))
    }
}
