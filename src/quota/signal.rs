use std::sync::atomic::AtomicBool;

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

pub fn stop_flag() -> &'static AtomicBool {
    &STOP_REQUESTED
}

#[cfg(unix)]
extern "C" fn on_stop_signal(_signal: nix::libc::c_int) {
    STOP_REQUESTED.store(true, std::sync::atomic::Ordering::SeqCst);
}

/// Routes SIGINT and SIGTERM to the stop flag so the monitor loop can finish
/// its current cycle and exit cleanly.
#[cfg(unix)]
pub fn install_stop_handlers() -> anyhow::Result<()> {
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

    let action = SigAction::new(
        SigHandler::Handler(on_stop_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only performs an atomic store.
        unsafe { sigaction(signal, &action) }
            .map_err(|err| anyhow::anyhow!("failed to install {signal} handler: {err}"))?;
    }
    Ok(())
}

/// No cooperative stop here: Ctrl+C ends the process wherever it is, which
/// can leave a `.quotawatch-*.tmp` file next to the outputs.
#[cfg(not(unix))]
pub fn install_stop_handlers() -> anyhow::Result<()> {
    tracing::warn!(
        "graceful stop is not supported on this platform; Ctrl+C may interrupt an output write"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{install_stop_handlers, stop_flag};
    use std::sync::atomic::Ordering;

    #[test]
    fn handlers_install_and_flag_starts_clear() {
        install_stop_handlers().expect("install");
        assert!(!stop_flag().load(Ordering::SeqCst));
    }
}
