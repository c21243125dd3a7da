//! Guarded sections that cannot be cut short by SIGINT.
//!
//! ```no_run
//! use disk_backup::backup::signal::SignalGuard;
//!
//! {
//!     let _guard = SignalGuard::enter();
//!     // Ctrl-C here is held back...
//! }
//! // ...and delivered to the previous handler here.
//! ```

use nix::libc::c_int;
use nix::sys::signal::{raise, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

static SIGINT_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn postpone_sigint(_: c_int) {
    SIGINT_PENDING.store(true, Ordering::SeqCst);
}

/// Holds SIGINT back while alive.
///
/// Entering swaps the process SIGINT disposition for one that only records
/// the signal. Dropping the guard puts the previous disposition back and, if
/// a SIGINT arrived in between, raises it again so the previous handler sees
/// it. Guards nest: an inner guard re-raises into the outer guard, which in
/// turn re-raises on its own drop.
///
/// Signal dispositions are process-wide and guards must be dropped in the
/// reverse order they were entered, so a guard stays on the thread that
/// created it.
#[must_use = "SIGINT is released as soon as the guard is dropped"]
pub struct SignalGuard {
    previous: SigAction,
    outer_pending: bool,
    _not_send: PhantomData<*const ()>,
}

impl SignalGuard {
    /// Installs the postponing handler.
    ///
    /// Aborts the process if the handler cannot be installed.
    pub fn enter() -> Self {
        let action = SigAction::new(
            SigHandler::Handler(postpone_sigint),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // pending state belongs to the enclosing guard, if any
        let outer_pending = SIGINT_PENDING.swap(false, Ordering::SeqCst);
        // SAFETY: the handler only stores into an atomic, which is async-signal-safe.
        let previous = match unsafe { sigaction(Signal::SIGINT, &action) } {
            Ok(previous) => previous,
            Err(e) => {
                error!("Cannot install SIGINT handler: {e}");
                std::process::abort();
            }
        };

        Self {
            previous,
            outer_pending,
            _not_send: PhantomData,
        }
    }

    /// Whether a SIGINT has been held back by this guard so far.
    pub fn interrupted(&self) -> bool {
        SIGINT_PENDING.load(Ordering::SeqCst)
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        // SAFETY: `previous` was the installed disposition when this guard was entered.
        if let Err(e) = unsafe { sigaction(Signal::SIGINT, &self.previous) } {
            error!("Cannot restore SIGINT handler: {e}");
            std::process::abort();
        }

        let received = SIGINT_PENDING.swap(self.outer_pending, Ordering::SeqCst);
        if received {
            debug!("Release previously received SIGINT");
            if let Err(e) = raise(Signal::SIGINT) {
                error!("Cannot re-raise SIGINT: {e}");
                std::process::abort();
            }
        }
    }
}
