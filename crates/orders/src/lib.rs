//! `atelier-orders` — tailoring orders and their production ledger.
//!
//! An order tracks one garment from intake to delivery: the agreed price,
//! the expenses booked against it, the advance the client has paid, and the
//! production steps the piece moves through. All money is kept in the
//! smallest currency unit, and the derived fields (`total_cost`, `profit`)
//! are recomputed synchronously whenever a write touches price or expenses.

pub mod order;

pub use order::{
    expense_total, Expense, NewOrder, Order, OrderPatch, OrderStatus, ProductionStep, StepStatus,
    DEFAULT_FIRST_STEP,
};
