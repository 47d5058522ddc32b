//! Auditing interceptor.
//!
//! Stamps the audit columns an entity opted into. Creation fields are set
//! once, on persist. Modification fields are set on persist and on every
//! flush that finds the entity dirty; the same flush puts any overwritten
//! creation field back to its stored value.

use log::trace;
use quarry_core::schema::{AuditField, EntityModel};
use quarry_core::{Row, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Supplies the identity of the acting principal.
pub trait AuditorAware: Send + Sync {
    /// `None` leaves the creator and modifier columns untouched.
    fn current_auditor(&self) -> Option<String>;
}

/// Always reports the same principal.
#[derive(Clone, Debug)]
pub struct FixedAuditor(String);

impl FixedAuditor {
    pub fn new(principal: impl Into<String>) -> Self {
        Self(principal.into())
    }
}

impl AuditorAware for FixedAuditor {
    fn current_auditor(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Reports a fresh random UUID for every call.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomAuditor;

impl AuditorAware for RandomAuditor {
    fn current_auditor(&self) -> Option<String> {
        Some(Uuid::new_v4().to_string())
    }
}

/// Time source in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

impl<T: AuditorAware + ?Sized> AuditorAware for Arc<T> {
    fn current_auditor(&self) -> Option<String> {
        (**self).current_auditor()
    }
}

pub struct AuditingInterceptor {
    auditor: Box<dyn AuditorAware>,
    clock: Box<dyn Clock>,
}

impl AuditingInterceptor {
    pub fn new(auditor: impl AuditorAware + 'static, clock: impl Clock + 'static) -> Self {
        Self {
            auditor: Box::new(auditor),
            clock: Box::new(clock),
        }
    }

    /// Random-UUID principal and the system clock.
    pub fn with_defaults() -> Self {
        Self::new(RandomAuditor, SystemClock)
    }

    /// Stamps a row about to be inserted.
    pub fn on_create(&self, model: &EntityModel, row: &mut Row) {
        if model.audit().is_empty() {
            return;
        }
        let now = Value::DateTime(self.clock.now_millis());
        let who = self.auditor.current_auditor().map(Value::String);
        for field in model.audit().fields() {
            let Some(position) = model.audit_position(field) else {
                continue;
            };
            match field {
                AuditField::CreatedDate | AuditField::LastModifiedDate => {
                    row.set(position, now.clone());
                }
                AuditField::CreatedBy | AuditField::LastModifiedBy => {
                    if let Some(who) = &who {
                        row.set(position, who.clone());
                    }
                }
            }
        }
        trace!(
            "event=audit_create module=audit entity={} at={}",
            model.name(),
            now
        );
    }

    /// Stamps a dirty row about to be written over `stored`.
    pub fn on_update(&self, model: &EntityModel, stored: &Row, row: &mut Row) {
        if model.audit().is_empty() {
            return;
        }
        let now = Value::DateTime(self.clock.now_millis());
        let mut who = None;
        for field in model.audit().fields() {
            let Some(position) = model.audit_position(field) else {
                continue;
            };
            if field.is_creation() {
                if let Some(original) = stored.get(position) {
                    row.set(position, original.clone());
                }
                continue;
            }
            match field {
                AuditField::LastModifiedDate => {
                    row.set(position, now.clone());
                }
                _ => {
                    if who.is_none() {
                        who = self.auditor.current_auditor();
                    }
                    if let Some(who) = &who {
                        row.set(position, Value::String(who.clone()));
                    }
                }
            }
        }
        trace!(
            "event=audit_update module=audit entity={} at={}",
            model.name(),
            now
        );
    }
}

impl Default for AuditingInterceptor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::schema::{AuditCapabilities, EntityModelBuilder, IdStrategy};
    use quarry_core::DataType;

    fn model(capabilities: AuditCapabilities) -> EntityModel {
        EntityModelBuilder::new("Member")
            .unwrap()
            .id("id", DataType::Int64, IdStrategy::Generated)
            .unwrap()
            .attribute("username", DataType::String)
            .unwrap()
            .auditing(capabilities)
            .build()
            .unwrap()
    }

    fn at(row: &Row, model: &EntityModel, field: AuditField) -> Value {
        row.get(model.audit_position(field).unwrap()).cloned().unwrap()
    }

    #[test]
    fn test_on_create_stamps_every_field() {
        let model = model(AuditCapabilities::full());
        let interceptor = AuditingInterceptor::new(FixedAuditor::new("alice"), ManualClock::new(1_000));
        let mut row = model.new_row();
        interceptor.on_create(&model, &mut row);

        assert_eq!(at(&row, &model, AuditField::CreatedDate), Value::DateTime(1_000));
        assert_eq!(at(&row, &model, AuditField::LastModifiedDate), Value::DateTime(1_000));
        assert_eq!(at(&row, &model, AuditField::CreatedBy), Value::from("alice"));
        assert_eq!(at(&row, &model, AuditField::LastModifiedBy), Value::from("alice"));
    }

    #[test]
    fn test_on_update_keeps_creation_fields() {
        let model = model(AuditCapabilities::full());
        let clock = Arc::new(ManualClock::new(1_000));
        let interceptor = AuditingInterceptor::new(FixedAuditor::new("alice"), Arc::clone(&clock));
        let mut stored = model.new_row();
        interceptor.on_create(&model, &mut stored);

        clock.advance(500);
        let mut changed = stored.clone();
        changed.set(1, Value::from("renamed"));
        changed.set(model.audit_position(AuditField::CreatedDate).unwrap(), Value::DateTime(1));
        interceptor.on_update(&model, &stored, &mut changed);

        assert_eq!(at(&changed, &model, AuditField::CreatedDate), Value::DateTime(1_000));
        assert_eq!(at(&changed, &model, AuditField::LastModifiedDate), Value::DateTime(1_500));
        assert_eq!(changed.get(1), Some(&Value::from("renamed")));
    }

    #[test]
    fn test_timestamps_only() {
        let model = model(AuditCapabilities::timestamps());
        let interceptor = AuditingInterceptor::new(FixedAuditor::new("alice"), ManualClock::new(7));
        let mut row = model.new_row();
        interceptor.on_create(&model, &mut row);
        assert_eq!(model.audit_position(AuditField::CreatedBy), None);
        assert_eq!(at(&row, &model, AuditField::CreatedDate), Value::DateTime(7));
    }

    #[test]
    fn test_no_capabilities_untouched() {
        let model = model(AuditCapabilities::none());
        let interceptor = AuditingInterceptor::with_defaults();
        let mut row = model.new_row();
        let before = row.clone();
        interceptor.on_create(&model, &mut row);
        assert_eq!(row, before);
    }

    #[test]
    fn test_random_auditor_is_uuid() {
        let a = RandomAuditor.current_auditor().unwrap();
        let b = RandomAuditor.current_auditor().unwrap();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
