/// Process exit codes.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    /// Generator, commit, or task failure.
    pub const OPERATIONAL_FAILURE: i32 = 1;
    /// The preview detected conflicts; nothing was committed.
    pub const CONFLICT_FAILURE: i32 = 2;
    /// Unknown collection or generator.
    pub const RESOLUTION_FAILURE: i32 = 3;
}
