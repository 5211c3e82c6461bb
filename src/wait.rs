/// How long a driver spins on a peripheral status flag.
///
/// Every handshake in this crate is a busy-wait on a status bit. With
/// [`Wait::Forever`] a peripheral that never raises the flag blocks the caller
/// indefinitely; this is the default and matches a dedicated polling loop.
/// [`Wait::Spins`] bounds the number of polls and turns a stuck flag into a
/// timeout error instead.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Wait {
    #[default]
    Forever,
    Spins(u32),
}

/// The flag was not raised within the allowed number of polls.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimedOut;

impl Wait {
    /// Poll `ready` until it returns `true`.
    ///
    /// Never returns `Err` under [`Wait::Forever`].
    pub fn until<F>(self, mut ready: F) -> Result<(), TimedOut>
    where
        F: FnMut() -> bool,
    {
        match self {
            Wait::Forever => {
                while !ready() {
                    core::hint::spin_loop();
                }
                Ok(())
            }
            Wait::Spins(limit) => {
                for _ in 0..limit {
                    if ready() {
                        return Ok(());
                    }
                    core::hint::spin_loop();
                }
                // one last look so a limit of 0 still checks the flag once
                if ready() {
                    Ok(())
                } else {
                    Err(TimedOut)
                }
            }
        }
    }
}
