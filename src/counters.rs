#[cfg(feature = "metrics")]
pub(crate) fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn metric_inc(_name: &'static str) {}

#[cfg(feature = "metrics")]
pub(crate) fn metric_inc_owner(name: &'static str, owner: &crate::types::OwnerCode) {
    metrics::increment_counter!(name, "owner" => owner.to_string());
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn metric_inc_owner(_name: &'static str, _owner: &crate::types::OwnerCode) {}
