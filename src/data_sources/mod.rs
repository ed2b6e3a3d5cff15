//! Read-only data sources.

use crate::resource::DynDataSource;

pub mod entity;
pub mod service_level_alert_helper;

/// Every data source the provider serves.
pub(crate) fn all() -> Vec<Box<dyn DynDataSource>> {
    vec![
        Box::new(entity::EntityDataSource),
        Box::new(service_level_alert_helper::ServiceLevelAlertHelperDataSource),
    ]
}
