//! Compatibility flags.
//!
//! All default off; each flag widens the accepted language or bends a
//! runtime rule toward a historical implementation. Flags are fixed at
//! interpreter construction and never mutated at runtime.

use bitflags::bitflags;

bitflags! {
    /// Interpreter compatibility options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Compat: u16 {
        /// Netscape JavaScript 1.1 quirks (`__proto__` visible, …).
        const JS11 = 1 << 0;
        /// JavaScript 1.2 quirks.
        const JS12 = 1 << 1;
        /// JavaScript 1.3 quirks.
        const JS13 = 1 << 2;
        /// JavaScript 1.4 quirks.
        const JS14 = 1 << 3;
        /// JavaScript 1.5 quirks.
        const JS15 = 1 << 4;
        /// ECMA-262 Annex B: octal escapes in string literals and other
        /// compatibility syntax.
        const ANNEX_B = 1 << 5;
        /// Non-standard extensions: `0`-prefixed octal number literals,
        /// signed hex strings in ToNumber.
        const EXT1 = 1 << 6;
        /// Reading through an unresolved reference yields `undefined`
        /// instead of throwing ReferenceError.
        const UNDEFDEF = 1 << 7;
        /// Treat `<!--` as a line comment (SGML-wrapped inline scripts).
        const SGMLCOM = 1 << 8;
    }
}

impl Compat {
    /// True when any Netscape JS1.1+ flag is set; gates `__proto__`
    /// visibility.
    #[must_use]
    pub fn any_js(self) -> bool {
        self.intersects(Self::JS11 | Self::JS12 | Self::JS13 | Self::JS14 | Self::JS15)
    }
}
