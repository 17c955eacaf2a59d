//! Built-in parameter vocabulary.
//!
//! The ordered code list is the default feature schema shared with the
//! predictor. Changing the order or contents requires a schema version bump.

/// Version of [`BUILTIN_PARAMETERS`] as a feature schema.
pub const BUILTIN_SCHEMA_VERSION: u32 = 1;

/// Every billing parameter code known to the system, in feature order.
pub const BUILTIN_PARAMETERS: &[&str] = &[
    "mob_inet",
    "fix_inet",
    "fix_ctv",
    "fix_ictv",
    "voice_mob",
    "voice_fix",
    "sms",
    "csd",
    "iot",
    "mms",
    "roaming",
    "mg",
    "mn",
    "mts",
    "conc",
    "fix_op",
    "vsr_roam",
    "national_roam",
    "mn_roam",
    "voice_ap",
    "voice_fee",
    "period_service",
    "one_time_service",
    "dop_service",
    "content",
    "services_service",
    "keo_sale",
    "discount",
    "only_inbound",
    "sms_a2p",
    "sms_gross",
    "skoring",
    "other_service",
    "voice_mail",
    "geo",
    "ep_for_number",
    "ep_for_line",
    "one_time_fee_for_number",
    "equipment rent",
    "add_package",
];

/// Whether `code` belongs to the built-in vocabulary.
pub fn is_builtin(code: &str) -> bool {
    BUILTIN_PARAMETERS.contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn builtin_codes_are_unique() {
        let unique: HashSet<_> = BUILTIN_PARAMETERS.iter().collect();
        assert_eq!(unique.len(), BUILTIN_PARAMETERS.len());
        assert_eq!(BUILTIN_PARAMETERS.len(), 40);
    }

    #[test]
    fn lookup() {
        assert!(is_builtin("fix_ctv"));
        assert!(is_builtin("equipment rent"));
        assert!(!is_builtin("fax"));
    }
}
