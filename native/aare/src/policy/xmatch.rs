//! Attachment matching for profile names.

use crate::config::CompileOptions;
use crate::create_dfa;
use crate::error::Result;
use crate::pattern::{PatternTranslator, PatternType};
use crate::perms::MAY_EXEC;
use crate::rules::{RuleClass, Ruleset};
use crate::table::CompressedTable;
use serde::Serialize;
use tracing::debug;

/// The part of a hat or child profile name after the last `//`.
///
/// Separators are consumed left to right, so in `a///b` the separator is
/// the first pair of slashes and the local name is `/b`.
pub fn local_name(mut name: &str) -> &str {
    while let Some(at) = name.find("//") {
        name = &name[at + 2..];
    }
    name
}

/// How executables are matched to a profile.
#[derive(Debug, Clone, Serialize)]
pub struct Xmatch {
    /// Absent when every name is a literal path.
    pub table: Option<CompressedTable>,
    /// Length of the literal prefix every matching path shares.
    pub len: usize,
}

/// Build the attachment matcher for a profile.
///
/// The attachment, when present, replaces the profile's own name. Literal
/// names with no alternates need no table.
pub fn build_xmatch(
    name: &str,
    attachment: Option<&str>,
    altnames: &[String],
    options: &CompileOptions,
) -> Result<Xmatch> {
    let translator = PatternTranslator::new(options);
    let primary = attachment.unwrap_or_else(|| local_name(name));
    let translation = translator.translate(primary, true)?;

    let prefix_len = |pattern: &str, ptype: PatternType, first_op: Option<usize>| match ptype {
        PatternType::Basic => pattern.len(),
        _ => first_op.unwrap_or(pattern.len()),
    };
    let mut len = prefix_len(primary, translation.ptype, translation.first_op);

    if translation.ptype == PatternType::Basic && altnames.is_empty() && attachment.is_none() {
        return Ok(Xmatch { table: None, len: 0 });
    }

    let mut ruleset = Ruleset::new();
    ruleset.add_rule(RuleClass::Xmatch, &[&translation.regex], false, MAY_EXEC, 0)?;
    for alt in altnames {
        let alt_translation = translator.translate(alt, true)?;
        len = len.min(prefix_len(alt, alt_translation.ptype, alt_translation.first_op));
        ruleset.add_rule(RuleClass::Xmatch, &[&alt_translation.regex], false, MAY_EXEC, 0)?;
    }

    let table = create_dfa(ruleset, options)?;
    debug!(profile = name, len, states = table.num_states(), "built xmatch table");
    Ok(Xmatch {
        table: Some(table),
        len,
    })
}
