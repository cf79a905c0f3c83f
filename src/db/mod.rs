//! Database module for the WixBuddy server
//!
//! This module holds the row models and the data access layer
//! over the Postgres pool.

pub mod models;
pub mod operations;

pub use models::{
    AccessToken, ChatMessage, ChatSession, PaymentRecord, Question, RefreshToken, Sender,
    Subscription, SubscriptionPlan, SubscriptionStatus, User,
};
pub use operations::DbOperations;
