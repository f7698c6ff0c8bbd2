//! Shared Application State
//!
//! This module defines the `AppState` struct handed to the axum handlers.
//! It is deliberately small: the webhook handler only needs the sending side
//! of the notification channel. Everything else is owned by exactly one
//! task.

use crate::webhook::CallReadyNotification;
use tokio::sync::mpsc;

/// The shared application state, created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub notifications: mpsc::Sender<CallReadyNotification>,
}
