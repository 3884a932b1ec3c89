// libs/payment-cell/src/services/payment.rs
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use notification_cell::models::NotificationKind;
use notification_cell::services::notify::NotificationService;

use crate::models::{
    ConfirmPaymentRequest, ListPaymentsQuery, Payment, PaymentError, PaymentStatus,
};

pub struct PaymentService {
    supabase: Arc<SupabaseClient>,
    notifications: NotificationService,
}

impl PaymentService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            notifications: NotificationService::new(Arc::clone(&supabase)),
            supabase,
        }
    }

    /// Create a pending payment for the caller's pending appointment. The
    /// amount is the fee snapshot taken at booking time, not the doctor's
    /// current fee.
    pub async fn initiate_payment(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Payment, PaymentError> {
        let patient = self.get_patient_profile(user_id, auth_token).await?;

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&patient_id=eq.{}&status=eq.pending",
            appointment_id, patient.0
        );
        let appointments: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        let appointment = appointments.into_iter().next()
            .ok_or(PaymentError::AppointmentNotPayable)?;

        let doctor_id = extract_uuid(&appointment, "doctor_id")?;
        let amount = appointment.get("consultation_fee")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| PaymentError::DatabaseError("Malformed appointment row".to_string()))?;

        let existing_path = format!(
            "/rest/v1/payments?appointment_id=eq.{}&status=eq.success",
            appointment_id
        );
        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &existing_path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        if !existing.is_empty() {
            return Err(PaymentError::AlreadyPaid);
        }

        let now = Utc::now();
        let payment_data = json!({
            "appointment_id": appointment_id,
            "patient_id": patient.0,
            "doctor_id": doctor_id,
            "amount": amount,
            "currency": "usd",
            "status": PaymentStatus::Pending.to_string(),
            "transaction_id": generate_transaction_id(),
            "payment_method": "card",
            "paid_at": Value::Null,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/payments",
            Some(auth_token),
            Some(payment_data),
            Some(headers),
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PaymentError::DatabaseError("Failed to create payment".to_string()));
        }

        let payment: Payment = serde_json::from_value(result[0].clone())
            .map_err(|e| PaymentError::DatabaseError(format!("Failed to parse payment: {}", e)))?;

        info!("Payment {} initiated for appointment {} ({} {})",
              payment.transaction_id, appointment_id, payment.amount, payment.currency);
        Ok(payment)
    }

    /// Settle a payment from the gateway callback. Runs with the anon key
    /// since the gateway carries no user session. On success the
    /// appointment moves straight to confirmed and both parties are
    /// notified; anything else marks the payment failed.
    pub async fn confirm_payment(
        &self,
        request: ConfirmPaymentRequest,
    ) -> Result<Payment, PaymentError> {
        // The gateway's vocabulary is not ours; anything it does not call a
        // success settles the payment as failed.
        let succeeded = request.status == "success";

        let now = Utc::now();
        let new_status = if succeeded { PaymentStatus::Success } else { PaymentStatus::Failed };

        let path = format!(
            "/rest/v1/payments?transaction_id=eq.{}&status=eq.pending",
            request.transaction_id
        );

        let mut update = json!({
            "status": new_status.to_string(),
            "updated_at": now.to_rfc3339(),
        });
        if succeeded {
            update["paid_at"] = json!(now.to_rfc3339());
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(update),
            Some(headers),
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        let payment: Payment = result.into_iter().next()
            .ok_or(PaymentError::NotFound)
            .and_then(|row| serde_json::from_value(row)
                .map_err(|e| PaymentError::DatabaseError(format!("Failed to parse payment: {}", e))))?;

        if succeeded {
            self.confirm_appointment(&payment).await;
        }

        info!("Payment {} settled as {}", payment.transaction_id, payment.status);
        Ok(payment)
    }

    /// Role-scoped payment history, newest first.
    pub async fn list_payments(
        &self,
        user_id: Uuid,
        role: Option<&str>,
        query: &ListPaymentsQuery,
        auth_token: &str,
    ) -> Result<(Vec<Payment>, i64, i64, i64), PaymentError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 50);
        let offset = (page - 1) * limit;

        let scope = match role {
            Some("patient") => {
                let patient = self.get_patient_profile(user_id, auth_token).await?;
                format!("patient_id=eq.{}&", patient.0)
            }
            Some("doctor") => {
                let doctor_id = self.get_doctor_profile_id(user_id, auth_token).await?;
                format!("doctor_id=eq.{}&", doctor_id)
            }
            _ => String::new(),
        };

        let path = format!(
            "/rest/v1/payments?{}order=created_at.desc&limit={}&offset={}",
            scope, limit, offset
        );

        let (rows, total) = self.supabase.request_paginated(&path, Some(auth_token))
            .await
            .map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        let payments: Vec<Payment> = rows
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        Ok((payments, total, page, limit))
    }

    /// Move the paid appointment to confirmed and notify both parties.
    /// Best effort past the payment row itself; the settlement already
    /// happened.
    async fn confirm_appointment(&self, payment: &Payment) {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.pending",
            payment.appointment_id
        );
        let update = json!({
            "status": "confirmed",
            "updated_at": Utc::now().to_rfc3339(),
        });

        let result: Result<Vec<Value>, _> = self.supabase.request(
            Method::PATCH,
            &path,
            None,
            Some(update),
        ).await;

        if let Err(e) = result {
            warn!("Failed to confirm appointment {} after payment: {}", payment.appointment_id, e);
            return;
        }

        if let Some(doctor_user_id) = self.profile_owner("doctors", payment.doctor_id).await {
            self.notifications.notify(
                doctor_user_id,
                "Appointment Confirmed",
                "A patient has paid for their appointment.",
                NotificationKind::Payment,
                Some("/doctor/appointments"),
                None,
            ).await;
        }

        if let Some(patient_user_id) = self.profile_owner("patients", payment.patient_id).await {
            self.notifications.notify(
                patient_user_id,
                "Payment Successful",
                "Your payment was received and the appointment is confirmed.",
                NotificationKind::Payment,
                Some(&format!("/patient/appointments/{}", payment.appointment_id)),
                None,
            ).await;
        }
    }

    async fn profile_owner(&self, table: &str, profile_id: Uuid) -> Option<Uuid> {
        let path = format!("/rest/v1/{}?id=eq.{}&select=user_id", table, profile_id);
        let result: Result<Vec<Value>, _> = self.supabase.request(
            Method::GET,
            &path,
            None,
            None,
        ).await;

        match result {
            Ok(rows) => rows.first()
                .and_then(|row| row.get("user_id"))
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok()),
            Err(e) => {
                warn!("Failed to resolve {} profile {} owner: {}", table, profile_id, e);
                None
            }
        }
    }

    async fn get_patient_profile(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<(Uuid,), PaymentError> {
        let path = format!("/rest/v1/patients?user_id=eq.{}&select=id", user_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next()
            .ok_or(PaymentError::PatientProfileNotFound)?;
        Ok((extract_uuid(&row, "id")?,))
    }

    async fn get_doctor_profile_id(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Uuid, PaymentError> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}&select=id", user_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PaymentError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next()
            .ok_or(PaymentError::NotFound)?;
        extract_uuid(&row, "id")
    }
}

fn extract_uuid(row: &Value, field: &str) -> Result<Uuid, PaymentError> {
    row.get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| PaymentError::DatabaseError(format!("Missing {} in row", field)))
}

/// Transaction ids are `txn_<millis>_<9 alphanumerics>`, unique enough
/// to key the gateway callback.
fn generate_transaction_id() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("txn_{}_{}", Utc::now().timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_have_expected_shape() {
        let id = generate_transaction_id();
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts[0], "txn");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn transaction_ids_do_not_collide() {
        assert_ne!(generate_transaction_id(), generate_transaction_id());
    }
}
