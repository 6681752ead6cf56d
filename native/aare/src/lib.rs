//! Policy pattern compiler.
//!
//! Translates shell-style policy globs into regular expressions, collects
//! them with their permissions into a [`Ruleset`], and compiles the ruleset
//! into a minimized DFA packed as a kernel-loadable [`CompressedTable`].
//!
//! ```
//! use aare::{CompileOptions, PatternTranslator, RuleClass, Ruleset, create_dfa};
//!
//! let options = CompileOptions::default();
//! let glob = PatternTranslator::new(&options).translate("/etc/**", false)?;
//!
//! let mut rules = Ruleset::new();
//! rules.add_rule(RuleClass::File, &[glob.regex], false, aare::perms::MAY_READ, 0)?;
//! let table = create_dfa(rules, &options)?;
//! assert_eq!(table.lookup(b"/etc/fstab").0, u64::from(aare::perms::MAY_READ));
//! let blob = table.flex_table("example")?;
//! # let _ = blob;
//! # Ok::<(), aare::Error>(())
//! ```

pub mod builder;
pub mod config;
pub mod equiv;
pub mod error;
pub mod formlang;
pub mod pattern;
pub mod perms;
pub mod policy;
pub mod rules;
pub mod table;

#[cfg(feature = "python")]
pub mod python;

pub use builder::build_dfa;
pub use config::{CompileOptions, DfaFlag};
pub use equiv::EquivalenceMap;
pub use error::{Error, ParseErrorKind, Result};
pub use pattern::{PatternTranslator, PatternType, Translation, convert_aaregex, filter_slashes};
pub use perms::PermissionRecord;
pub use policy::{CompiledProfile, Profile, compile_profile};
pub use rules::{Rule, RuleClass, Ruleset};
pub use table::{CompressedTable, CompressionStats};

use tracing::debug;

/// Compile `ruleset` into a compressed table, consuming it.
pub fn create_dfa(ruleset: Ruleset, options: &CompileOptions) -> Result<CompressedTable> {
    let rules = ruleset.len();
    let dfa = build_dfa(ruleset, options)?;
    let table = CompressedTable::from_dfa(&dfa, options)?;
    debug!(rules, states = table.num_states(), "created dfa table");
    Ok(table)
}
