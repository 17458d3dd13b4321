use std::io;

use chat_api::CancelSignal;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;

/// Routes SIGINT and SIGTERM into `cancel`.
///
/// The first signal only raises the flag so the session can offer to save.
/// A second one while the flag is still set terminates the process with
/// exit code 130.
pub fn install_interrupt_flag(cancel: &CancelSignal) -> io::Result<()> {
    for signal in [SIGINT, SIGTERM] {
        // Registered first so it observes the flag before this signal sets it.
        flag::register_conditional_shutdown(signal, 130, cancel.clone())?;
        flag::register(signal, cancel.clone())?;
    }
    Ok(())
}
