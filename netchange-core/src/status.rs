/// Exact `Status.Message` strings the core produces, per spec.md §6
/// ("Error text as contract" — §9 Design Notes). These are part of the
/// public contract: northbound observers and tests assert on them verbatim.
pub mod messages {
    pub const CHANGE_REJECTED_BY_DEVICE: &str = "change rejected by device";
    pub const ROLLBACK_REJECTED_BY_DEVICE: &str = "rollback rejected by device";
    pub const ADMINISTRATIVELY_REQUESTED_ROLLBACK: &str = "Administratively requested rollback";
    pub const SUCCESS: &str = "";
}
