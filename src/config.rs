/// Construction options for a [`Cedar`](crate::Cedar).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Enumerate children in label order. When false, a new label goes to the
    /// front of its parent's chain (behind the terminal, if there is one).
    pub ordered: bool,
    /// Failed multi-slot placements a block tolerates before it leaves the
    /// Open list.
    pub max_trial: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ordered: true,
            max_trial: 1,
        }
    }
}
