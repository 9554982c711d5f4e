//! Signal plumbing for the quit-confirmation protocol.
//!
//! The handlers never print or allocate: SIGINT only raises an atomic flag that the
//! read loop polls, and SIGTSTP is swallowed so the shell cannot be suspended.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

static INTERRUPT_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn interrupt_handler(_sig: libc::c_int) {
    INTERRUPT_PENDING.store(true, Ordering::SeqCst);
}

extern "C" fn suspend_handler(_sig: libc::c_int) {}

/// Handle to the "interrupt pending" flag consulted by the read loop.
#[derive(Debug, Clone, Copy)]
pub struct InterruptFlag {
    pending: &'static AtomicBool,
    owns_handlers: bool,
}

impl InterruptFlag {
    /// Install the SIGINT and SIGTSTP handlers and return the flag they set.
    pub fn install() -> io::Result<Self> {
        set_disposition(libc::SIGINT, interrupt_handler as *const () as libc::sighandler_t)?;
        set_disposition(libc::SIGTSTP, suspend_handler as *const () as libc::sighandler_t)?;
        debug!("signal handlers installed");
        Ok(Self {
            pending: &INTERRUPT_PENDING,
            owns_handlers: true,
        })
    }

    /// A flag that no signal handler writes to; interrupts only come from
    /// [`InterruptFlag::raise`]. Used when the shell is driven programmatically.
    pub fn detached() -> Self {
        Self {
            pending: Box::leak(Box::new(AtomicBool::new(false))),
            owns_handlers: false,
        }
    }

    /// Mark an interrupt as pending, as the SIGINT handler does.
    pub fn raise(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }

    /// Ignore SIGINT while the quit question is outstanding.
    pub fn suspend(&self) -> io::Result<()> {
        if self.owns_handlers {
            set_disposition(libc::SIGINT, libc::SIG_IGN)?;
        }
        Ok(())
    }

    /// Put the SIGINT handler back after a "no" answer.
    pub fn rearm(&self) -> io::Result<()> {
        if self.owns_handlers {
            set_disposition(libc::SIGINT, interrupt_handler as *const () as libc::sighandler_t)?;
        }
        Ok(())
    }
}

/// Install `handler` for `sig` without `SA_RESTART`, so a blocked read returns
/// `EINTR` and the loop gets to react to the signal right away.
fn set_disposition(sig: libc::c_int, handler: libc::sighandler_t) -> io::Result<()> {
    // SAFETY: the sigaction struct is fully initialised before use and the handlers
    // only touch an atomic.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(sig, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
