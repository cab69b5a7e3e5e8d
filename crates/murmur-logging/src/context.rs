//! User context injection
//!
//! Thread-local storage for the acting user's storage key, so every span
//! opened while a [`UserContextGuard`] is alive can be tagged with it.

use std::cell::RefCell;

use murmur_core::{CurrentUser, StorageKey};

thread_local! {
    static USER_CONTEXT: RefCell<Option<StorageKey>> = const { RefCell::new(None) };
}

/// RAII guard for the current user context
///
/// Sets the user key for the current thread on creation and restores the
/// previous one (if any) when dropped. Guards nest.
///
/// # Example
///
/// ```rust
/// use murmur_core::CurrentUser;
/// use murmur_logging::UserContextGuard;
///
/// let alice = CurrentUser::new("a@example.com", "Alice Example").unwrap();
/// let _guard = UserContextGuard::new(&alice);
/// assert_eq!(UserContextGuard::current_key().unwrap().as_str(), "a-example-com");
/// ```
#[must_use = "the context is cleared as soon as the guard is dropped"]
pub struct UserContextGuard {
    previous: Option<StorageKey>,
}

impl UserContextGuard {
    /// Set the acting user for the current scope
    pub fn new(user: &CurrentUser) -> Self {
        Self::for_key(user.key().clone())
    }

    /// Set the context from a bare storage key
    pub fn for_key(key: StorageKey) -> Self {
        let previous = USER_CONTEXT.with(|ctx| ctx.replace(Some(key)));
        Self { previous }
    }

    /// The key set by the innermost live guard on this thread
    pub fn current_key() -> Option<StorageKey> {
        USER_CONTEXT.with(|ctx| ctx.borrow().clone())
    }
}

impl Drop for UserContextGuard {
    fn drop(&mut self) {
        USER_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block with the given user as logging context
///
/// ```ignore
/// with_user_context!(&alice, {
///     tracing::info!("sending");
/// });
/// ```
#[macro_export]
macro_rules! with_user_context {
    ($user:expr, $body:block) => {{
        let _guard = $crate::context::UserContextGuard::new($user);
        $body
    }};
}
