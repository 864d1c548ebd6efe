//! Compilation context: target-dependent facts the type system consults.

use target_lexicon::{OperatingSystem, PointerWidth, Triple};

/// Read-only target and language knowledge for one compilation.
///
/// The type queries (`sizeof`, integer promotion, `char` signedness) take
/// a `&CompileContext` rather than baking host assumptions in.
#[derive(Clone)]
pub struct CompileContext {
    pub target: Triple,
    /// Whether plain `char` behaves as a signed type on the target.
    pub char_is_signed: bool,
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new(Triple::host())
    }
}

impl CompileContext {
    pub fn new(target: Triple) -> Self {
        CompileContext {
            target,
            char_is_signed: true,
        }
    }

    /// Pointer size in bytes for the target architecture.
    pub fn pointer_width(&self) -> u64 {
        match self.target.pointer_width() {
            Ok(PointerWidth::U16) => 2,
            Ok(PointerWidth::U32) => 4,
            Ok(PointerWidth::U64) => 8,
            Err(_) => 8,
        }
    }

    /// Size of `long`/`unsigned long` in bytes: pointer width on
    /// Unix-like systems, 4 on Windows and UEFI, 4 on anything else.
    pub fn long_width(&self) -> u64 {
        use OperatingSystem::*;
        match self.target.operating_system {
            Windows | Uefi => 4,
            Linux
            | Freebsd
            | Netbsd
            | Openbsd
            | Dragonfly
            | Solaris
            | Illumos
            | Haiku
            | Aix
            | Fuchsia
            | Darwin(_)
            | MacOSX(_)
            | IOS(_)
            | TvOS(_)
            | WatchOS(_) => self.pointer_width(),
            _ => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn long_is_4_bytes_on_windows() {
        let ctx = CompileContext::new(Triple::from_str("x86_64-pc-windows-msvc").unwrap());
        assert_eq!(ctx.pointer_width(), 8);
        assert_eq!(ctx.long_width(), 4);
    }

    #[test]
    fn long_is_pointer_width_on_linux() {
        let ctx = CompileContext::new(Triple::from_str("x86_64-unknown-linux-gnu").unwrap());
        assert_eq!(ctx.long_width(), 8);

        let ctx32 = CompileContext::new(Triple::from_str("i686-unknown-linux-gnu").unwrap());
        assert_eq!(ctx32.long_width(), 4);
    }
}
