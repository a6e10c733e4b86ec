use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{ClientId, DomainError, Entity, GarmentType, OrderId, TenantId};

/// First production step every new order starts in.
pub const DEFAULT_FIRST_STEP: &str = "Coupe";

/// Order lifecycle status.
///
/// Wire names are the French labels the remote API stores. There is no
/// enforced transition graph: a patch may set any value, including moving a
/// delivered order back to new.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "Nouvelle")]
    New,
    #[serde(rename = "En cours")]
    InProgress,
    #[serde(rename = "Terminée")]
    Completed,
    #[serde(rename = "Livrée")]
    Delivered,
    #[serde(rename = "Annulée")]
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::New,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "Nouvelle",
            OrderStatus::InProgress => "En cours",
            OrderStatus::Completed => "Terminée",
            OrderStatus::Delivered => "Livrée",
            OrderStatus::Cancelled => "Annulée",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single production step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    #[default]
    Pending,
    #[serde(rename = "In-Progress")]
    InProgress,
    Completed,
}

/// One expense booked against an order (fabric, trim, outside labor...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub description: String,
    /// Cost in smallest currency unit.
    pub cost: i64,
    pub date: DateTime<Utc>,
}

impl Expense {
    /// Build an expense dated now.
    pub fn new(description: impl Into<String>, cost: i64) -> Result<Self, DomainError> {
        let expense = Self {
            description: description.into(),
            cost,
            date: Utc::now(),
        };
        expense.validate()?;
        Ok(expense)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.description.trim().is_empty() {
            return Err(DomainError::validation("expense description cannot be empty"));
        }
        if self.cost < 0 {
            return Err(DomainError::validation("expense cost cannot be negative"));
        }
        Ok(())
    }
}

/// One stage of manufacturing, with its own status and cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionStep {
    pub name: String,
    pub status: StepStatus,
    /// Cost in smallest currency unit.
    pub cost: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProductionStep {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("step name cannot be empty"));
        }
        if self.cost < 0 {
            return Err(DomainError::validation("step cost cannot be negative"));
        }
        Ok(())
    }
}

/// Sum of all expense costs, in smallest currency unit.
pub fn expense_total(expenses: &[Expense]) -> i64 {
    expenses.iter().map(|e| e.cost).sum()
}

/// A tailoring order and its production ledger.
///
/// `total_cost` is always the sum of `expenses`, and `profit` is always
/// `total_price - total_cost` (it goes negative when expenses overrun the
/// price). Both are recomputed on creation and on every patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub garment_type: GarmentType,
    pub status: OrderStatus,
    pub current_step: String,
    pub total_price: i64,
    pub total_cost: i64,
    pub profit: i64,
    #[serde(default)]
    pub advance_payment: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub production_steps: Vec<ProductionStep>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Order {
    /// Apply a partial update in place, then recompute the money fields.
    ///
    /// `advance_payment` in the patch is an amount to add on top of what the
    /// client already paid, not a replacement.
    pub fn apply_patch(&mut self, patch: &OrderPatch) {
        if let Some(garment_type) = patch.garment_type {
            self.garment_type = garment_type;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(step) = &patch.current_step {
            self.current_step = step.clone();
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(expenses) = &patch.expenses {
            self.expenses = expenses.clone();
            self.total_cost = expense_total(&self.expenses);
        }
        if let Some(steps) = &patch.production_steps {
            self.production_steps = steps.clone();
        }
        if let Some(price) = patch.total_price {
            self.total_price = price;
        }
        if let Some(advance) = patch.advance_payment {
            self.advance_payment += advance;
        }
        self.profit = self.total_price - self.total_cost;
    }

    /// Patch that appends one expense to this order's list.
    pub fn with_expense(&self, expense: Expense) -> OrderPatch {
        let mut expenses = self.expenses.clone();
        expenses.push(expense);
        OrderPatch {
            expenses: Some(expenses),
            ..OrderPatch::default()
        }
    }

    /// Patch that drops the expense at `index`. An out-of-range index leaves
    /// the list unchanged.
    pub fn without_expense(&self, index: usize) -> OrderPatch {
        let expenses = self
            .expenses
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, e)| e.clone())
            .collect();
        OrderPatch {
            expenses: Some(expenses),
            ..OrderPatch::default()
        }
    }

    /// Amount still owed by the client.
    pub fn balance_due(&self) -> i64 {
        self.total_price - self.advance_payment
    }
}

/// Operator input for taking a new order.
///
/// A new order always starts with status `Nouvelle` and the `Coupe` step;
/// `total_cost` and `profit` are computed, never supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub client_id: ClientId,
    pub garment_type: GarmentType,
    #[serde(default)]
    pub total_price: i64,
    #[serde(default)]
    pub advance_payment: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub production_steps: Vec<ProductionStep>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.total_price < 0 {
            return Err(DomainError::validation("total price cannot be negative"));
        }
        if self.advance_payment < 0 {
            return Err(DomainError::validation("advance payment cannot be negative"));
        }
        for expense in &self.expenses {
            expense.validate()?;
        }
        for step in &self.production_steps {
            step.validate()?;
        }
        Ok(())
    }

    /// Materialize the full record under a tenant, minting the id and the
    /// creation timestamp locally and computing the derived money fields.
    pub fn into_record(self, tenant_id: TenantId) -> Result<Order, DomainError> {
        self.validate()?;
        let total_cost = expense_total(&self.expenses);
        Ok(Order {
            id: OrderId::new(),
            tenant_id,
            client_id: self.client_id,
            garment_type: self.garment_type,
            status: OrderStatus::New,
            current_step: DEFAULT_FIRST_STEP.to_string(),
            total_price: self.total_price,
            total_cost,
            profit: self.total_price - total_cost,
            advance_payment: self.advance_payment,
            due_date: self.due_date,
            expenses: self.expenses,
            production_steps: self.production_steps,
            created_at: Utc::now(),
        })
    }
}

/// Partial update for an order.
///
/// Absent fields are left untouched. `expenses` and `production_steps`
/// replace the whole list; `advance_payment` is additive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub garment_type: Option<GarmentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<i64>,
    /// Amount to add to the advance already paid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance_payment: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expenses: Option<Vec<Expense>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_steps: Option<Vec<ProductionStep>>,
}

impl OrderPatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(price) = self.total_price {
            if price < 0 {
                return Err(DomainError::validation("total price cannot be negative"));
            }
        }
        if let Some(advance) = self.advance_payment {
            if advance < 0 {
                return Err(DomainError::validation(
                    "advance payment increment cannot be negative",
                ));
            }
        }
        if let Some(expenses) = &self.expenses {
            for expense in expenses {
                expense.validate()?;
            }
        }
        if let Some(steps) = &self.production_steps {
            for step in steps {
                step.validate()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_client_id() -> ClientId {
        ClientId::new()
    }

    fn jabador_order(total_price: i64) -> NewOrder {
        NewOrder {
            client_id: test_client_id(),
            garment_type: GarmentType::Jabador,
            total_price,
            advance_payment: 0,
            due_date: None,
            expenses: Vec::new(),
            production_steps: Vec::new(),
        }
    }

    #[test]
    fn new_order_starts_new_in_coupe() {
        let order = jabador_order(1000).into_record(test_tenant_id()).unwrap();
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.current_step, DEFAULT_FIRST_STEP);
        assert_eq!(order.total_cost, 0);
        assert_eq!(order.profit, 1000);
    }

    #[test]
    fn create_computes_cost_and_profit_from_expenses() {
        let mut new = jabador_order(1000);
        new.expenses.push(Expense::new("Tissu", 300).unwrap());

        let order = new.into_record(test_tenant_id()).unwrap();
        assert_eq!(order.total_cost, 300);
        assert_eq!(order.profit, 700);
    }

    #[test]
    fn profit_goes_negative_when_expenses_overrun_price() {
        let mut new = jabador_order(200);
        new.expenses.push(Expense::new("Tissu", 350).unwrap());

        let order = new.into_record(test_tenant_id()).unwrap();
        assert_eq!(order.total_cost, 350);
        assert_eq!(order.profit, -150);
    }

    #[test]
    fn patch_advance_payment_is_additive() {
        let mut new = jabador_order(1000);
        new.advance_payment = 100;
        let mut order = new.into_record(test_tenant_id()).unwrap();

        order.apply_patch(&OrderPatch {
            advance_payment: Some(200),
            ..OrderPatch::default()
        });
        assert_eq!(order.advance_payment, 300);
    }

    #[test]
    fn patch_expenses_recomputes_money() {
        let mut order = jabador_order(1000).into_record(test_tenant_id()).unwrap();

        let expenses = vec![
            Expense::new("Tissu", 250).unwrap(),
            Expense::new("Sfifa", 150).unwrap(),
        ];
        order.apply_patch(&OrderPatch {
            expenses: Some(expenses),
            ..OrderPatch::default()
        });

        assert_eq!(order.total_cost, 400);
        assert_eq!(order.profit, 600);
    }

    #[test]
    fn patch_price_recomputes_profit() {
        let mut new = jabador_order(1000);
        new.expenses.push(Expense::new("Tissu", 300).unwrap());
        let mut order = new.into_record(test_tenant_id()).unwrap();

        order.apply_patch(&OrderPatch {
            total_price: Some(1500),
            ..OrderPatch::default()
        });
        assert_eq!(order.total_cost, 300);
        assert_eq!(order.profit, 1200);
    }

    #[test]
    fn patch_sets_any_status_without_transition_checks() {
        let mut order = jabador_order(1000).into_record(test_tenant_id()).unwrap();

        order.apply_patch(&OrderPatch {
            status: Some(OrderStatus::Delivered),
            ..OrderPatch::default()
        });
        assert_eq!(order.status, OrderStatus::Delivered);

        // Moving backwards is allowed as well.
        order.apply_patch(&OrderPatch {
            status: Some(OrderStatus::New),
            ..OrderPatch::default()
        });
        assert_eq!(order.status, OrderStatus::New);
    }

    #[test]
    fn with_expense_builds_an_appending_patch() {
        let mut new = jabador_order(1000);
        new.expenses.push(Expense::new("Tissu", 300).unwrap());
        let mut order = new.into_record(test_tenant_id()).unwrap();

        let patch = order.with_expense(Expense::new("Boutons", 50).unwrap());
        order.apply_patch(&patch);

        assert_eq!(order.expenses.len(), 2);
        assert_eq!(order.total_cost, 350);
        assert_eq!(order.profit, 650);
    }

    #[test]
    fn without_expense_drops_by_index() {
        let mut new = jabador_order(1000);
        new.expenses.push(Expense::new("Tissu", 300).unwrap());
        new.expenses.push(Expense::new("Boutons", 50).unwrap());
        let mut order = new.into_record(test_tenant_id()).unwrap();

        let patch = order.without_expense(0);
        order.apply_patch(&patch);

        assert_eq!(order.expenses.len(), 1);
        assert_eq!(order.expenses[0].description, "Boutons");
        assert_eq!(order.total_cost, 50);
        assert_eq!(order.profit, 950);
    }

    #[test]
    fn without_expense_out_of_range_is_a_no_op() {
        let mut new = jabador_order(1000);
        new.expenses.push(Expense::new("Tissu", 300).unwrap());
        let mut order = new.into_record(test_tenant_id()).unwrap();

        let patch = order.without_expense(7);
        order.apply_patch(&patch);

        assert_eq!(order.expenses.len(), 1);
        assert_eq!(order.total_cost, 300);
    }

    #[test]
    fn rejects_negative_price() {
        let err = jabador_order(-1).into_record(test_tenant_id()).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for negative price"),
        }
    }

    #[test]
    fn rejects_empty_expense_description() {
        let err = Expense::new("  ", 100).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty description"),
        }
    }

    #[test]
    fn patch_rejects_negative_advance_increment() {
        let patch = OrderPatch {
            advance_payment: Some(-50),
            ..OrderPatch::default()
        };
        let err = patch.validate().unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for negative advance increment"),
        }
    }

    #[test]
    fn status_serializes_to_french_wire_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::New).unwrap(),
            "\"Nouvelle\""
        );
        assert_eq!(
            serde_json::to_string(&OrderStatus::InProgress).unwrap(),
            "\"En cours\""
        );
        assert_eq!(
            serde_json::to_string(&OrderStatus::Completed).unwrap(),
            "\"Terminée\""
        );
        assert_eq!(
            serde_json::to_string(&OrderStatus::Delivered).unwrap(),
            "\"Livrée\""
        );
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"Annulée\""
        );
    }

    #[test]
    fn step_status_uses_hyphenated_in_progress() {
        assert_eq!(
            serde_json::to_string(&StepStatus::InProgress).unwrap(),
            "\"In-Progress\""
        );
        let status: StepStatus = serde_json::from_str("\"In-Progress\"").unwrap();
        assert_eq!(status, StepStatus::InProgress);
    }

    #[test]
    fn wire_json_is_camel_case() {
        let order = jabador_order(1000).into_record(test_tenant_id()).unwrap();
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("clientId").is_some());
        assert!(json.get("totalPrice").is_some());
        assert!(json.get("currentStep").is_some());
        assert!(json.get("advancePayment").is_some());
        assert!(json.get("total_price").is_none());
    }

    #[test]
    fn balance_due_tracks_advance() {
        let mut new = jabador_order(1000);
        new.advance_payment = 400;
        let order = new.into_record(test_tenant_id()).unwrap();
        assert_eq!(order.balance_due(), 600);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after creation, profit is always price minus the sum of
        /// expense costs, and total_cost is exactly that sum.
        #[test]
        fn money_invariants_hold_after_create(
            price in 0i64..1_000_000_000i64,
            costs in prop::collection::vec(0i64..1_000_000i64, 0..20)
        ) {
            let mut new = jabador_order(price);
            for (i, cost) in costs.iter().enumerate() {
                new.expenses.push(Expense::new(format!("expense {i}"), *cost).unwrap());
            }

            let order = new.into_record(test_tenant_id()).unwrap();
            let cost_sum: i64 = costs.iter().sum();
            prop_assert_eq!(order.total_cost, cost_sum);
            prop_assert_eq!(order.profit, price - cost_sum);
        }

        /// Property: replacing the expense list via a patch re-establishes
        /// both money invariants regardless of the previous state.
        #[test]
        fn money_invariants_hold_after_patch(
            price in 0i64..1_000_000_000i64,
            initial in prop::collection::vec(0i64..1_000_000i64, 0..10),
            replacement in prop::collection::vec(0i64..1_000_000i64, 0..10)
        ) {
            let mut new = jabador_order(price);
            for (i, cost) in initial.iter().enumerate() {
                new.expenses.push(Expense::new(format!("expense {i}"), *cost).unwrap());
            }
            let mut order = new.into_record(test_tenant_id()).unwrap();

            let expenses: Vec<Expense> = replacement
                .iter()
                .enumerate()
                .map(|(i, cost)| Expense::new(format!("replacement {i}"), *cost).unwrap())
                .collect();
            order.apply_patch(&OrderPatch {
                expenses: Some(expenses),
                ..OrderPatch::default()
            });

            let cost_sum: i64 = replacement.iter().sum();
            prop_assert_eq!(order.total_cost, cost_sum);
            prop_assert_eq!(order.profit, price - cost_sum);
        }

        /// Property: a sequence of advance patches accumulates to the sum of
        /// the increments.
        #[test]
        fn advance_patches_accumulate(
            increments in prop::collection::vec(0i64..100_000i64, 1..10)
        ) {
            let mut order = jabador_order(1_000_000).into_record(test_tenant_id()).unwrap();
            for increment in &increments {
                order.apply_patch(&OrderPatch {
                    advance_payment: Some(*increment),
                    ..OrderPatch::default()
                });
            }
            let total: i64 = increments.iter().sum();
            prop_assert_eq!(order.advance_payment, total);
        }
    }
}
