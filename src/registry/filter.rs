use bitflags::bitflags;

bitflags! {
    /// Kinds of change a notification request listens for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NotifyFilter: u32 {
        /// A subkey was added or deleted.
        const SUBKEY = 0x0000_0001;
        /// Key attributes changed.
        const ATTRIBUTES = 0x0000_0002;
        /// A value was added, deleted or modified.
        const VALUE = 0x0000_0004;
        /// The key's security descriptor changed.
        const SECURITY = 0x0000_0008;
        /// Notification is not bound to the lifetime of the arming thread.
        const THREAD_AGNOSTIC = 0x1000_0000;
    }
}

impl NotifyFilter {
    /// Filter used by the reload loop: value changes and subkey churn.
    pub const RELOAD: NotifyFilter = NotifyFilter::SUBKEY.union(NotifyFilter::VALUE);

    /// The change kinds, without the threading modifier.
    pub fn change_kinds(self) -> NotifyFilter {
        self.difference(NotifyFilter::THREAD_AGNOSTIC)
    }

    /// Whether the thread-agnostic modifier is present.
    pub fn is_thread_agnostic(self) -> bool {
        self.contains(NotifyFilter::THREAD_AGNOSTIC)
    }
}

impl Default for NotifyFilter {
    fn default() -> Self {
        NotifyFilter::RELOAD
    }
}
