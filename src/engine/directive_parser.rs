use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::engine::apply_directive::apply_directive;
use crate::model::directive::{Directive, StatOp};
use crate::model::event_result::{DirectiveApplication, DirectiveOutcome, ParsedResponse};
use crate::model::game_state::CharacterSheet;

/// Marks the end of a scenario's designed story.
pub const SCENE_COMPLETE_TOKEN: &str = "[SHOW_AD_BUTTON]";

pub const ACTION_PREFIX: &str = "[ACTION]";

// Arguments never cross a line break.
static SCENE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&regex::escape(SCENE_COMPLETE_TOKEN)).expect("valid regex"));
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[NAME\][ \t]*(.*)").expect("valid regex"));
static STAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[STAT\][ \t]*(\w+)[ \t]*([+\-=]?)[ \t]*(\d+)").expect("valid regex")
});
static DAMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[DAMAGE\][ \t]*(\d+)").expect("valid regex"));
static HEAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[HEAL\][ \t]*(\d+)").expect("valid regex"));
static ITEM_ADD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[ITEM_ADD\][ \t]*(.*)").expect("valid regex"));
static ITEM_REMOVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[ITEM_REMOVE\][ \t]*(.*)").expect("valid regex"));

#[derive(Debug, Clone)]
struct Line {
    text: String,
    /// A tag was cut out of this line.
    touched: bool,
}

/// Reply text still waiting to be scanned.
#[derive(Debug, Clone)]
struct Remaining {
    lines: Vec<Line>,
}

impl Remaining {
    fn new(raw: &str) -> Self {
        Self {
            lines: raw
                .split('\n')
                .map(|l| Line { text: l.to_string(), touched: false })
                .collect(),
        }
    }

    /// Lines emptied by tag removal disappear; blank lines the narrator wrote stay.
    fn into_text(self) -> String {
        self.lines
            .into_iter()
            .filter(|l| !(l.touched && l.text.trim().is_empty()))
            .map(|l| l.text)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

/// Pull every match of `re` out of the text. `read` turns a match into a value;
/// matches it rejects are still removed.
fn extract<T>(
    mut remaining: Remaining,
    re: &Regex,
    mut read: impl FnMut(&Captures) -> Option<T>,
) -> (Vec<T>, Remaining) {
    let mut found = Vec::new();

    for line in &mut remaining.lines {
        if !re.is_match(&line.text) {
            continue;
        }
        found.extend(re.captures_iter(&line.text).filter_map(|c| read(&c)));
        line.text = re.replace_all(&line.text, "").trim().to_string();
        line.touched = true;
    }

    (found, remaining)
}

fn extract_actions(mut remaining: Remaining) -> (Vec<String>, Remaining) {
    let mut actions = Vec::new();

    remaining.lines.retain(|line| match line.text.trim_start().strip_prefix(ACTION_PREFIX) {
        Some(rest) => {
            let action = rest.trim();
            if !action.is_empty() {
                actions.push(action.to_string());
            }
            false
        }
        None => true,
    });

    (actions, remaining)
}

fn number(caps: &Captures, group: usize) -> Option<i32> {
    caps.get(group)?.as_str().parse().ok()
}

fn label(caps: &Captures) -> Option<String> {
    let text = caps.get(1)?.as_str().trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Directives and leftovers of one reply, before anything is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedReply {
    pub scene_complete: bool,
    pub directives: Vec<Directive>,
    pub actions: Vec<String>,
    pub narrative_text: String,
}

/// Scan a narrator reply. Extractors run in a fixed order, each on the text
/// the previous ones left behind.
pub fn extract_reply(raw: &str) -> ExtractedReply {
    let remaining = Remaining::new(raw);

    let (scene, remaining) = extract(remaining, &SCENE_RE, |_| Some(()));
    let (names, remaining) = extract(remaining, &NAME_RE, label);
    let (stats, remaining) = extract(remaining, &STAT_RE, |c| {
        Some(Directive::ModifyStat {
            key: c.get(1)?.as_str().to_string(),
            op: StatOp::from_symbol(c.get(2).map_or("", |m| m.as_str())),
            amount: number(c, 3)?,
        })
    });
    let (damage, remaining) =
        extract(remaining, &DAMAGE_RE, |c| Some(Directive::Damage { amount: number(c, 1)? }));
    let (heal, remaining) =
        extract(remaining, &HEAL_RE, |c| Some(Directive::Heal { amount: number(c, 1)? }));
    let (added, remaining) =
        extract(remaining, &ITEM_ADD_RE, |c| Some(Directive::AddItem { label: label(c)? }));
    let (removed, remaining) =
        extract(remaining, &ITEM_REMOVE_RE, |c| Some(Directive::RemoveItem { label: label(c)? }));
    let (actions, remaining) = extract_actions(remaining);

    let mut directives = Vec::new();
    // Only the first name counts.
    if let Some(name) = names.into_iter().next() {
        directives.push(Directive::SetName { name });
    }
    directives.extend(stats);
    directives.extend(damage);
    directives.extend(heal);
    directives.extend(added);
    directives.extend(removed);

    ExtractedReply {
        scene_complete: !scene.is_empty(),
        directives,
        actions,
        narrative_text: remaining.into_text(),
    }
}

/// Parse a narrator reply and apply its directives to `sheet` in place.
pub fn parse_response(raw: &str, sheet: &mut CharacterSheet) -> ParsedResponse {
    let extracted = extract_reply(raw);

    let before = sheet.stats.scores.clone();
    let mut touched_stats = Vec::new();
    let mut name = None;
    let mut effects = Vec::with_capacity(extracted.directives.len());

    for directive in extracted.directives {
        let outcome = apply_directive(sheet, &directive);
        match &outcome {
            DirectiveOutcome::Applied => {
                tracing::debug!(directive = directive.short_name(), "directive applied");
                match &directive {
                    Directive::SetName { name: n } => name = Some(n.clone()),
                    Directive::ModifyStat { key, .. } => touched_stats.push(key.clone()),
                    _ => {}
                }
            }
            DirectiveOutcome::Ignored { reason } => {
                tracing::debug!(directive = directive.short_name(), %reason, "directive ignored");
            }
        }
        effects.push(DirectiveApplication { directive, outcome });
    }

    let mut stat_changes = BTreeMap::new();
    for key in touched_stats {
        let (Some(old), Some(new)) = (before.get(&key), sheet.stats.score(&key)) else {
            continue;
        };
        let diff = i64::from(new) - i64::from(*old);
        if diff != 0 {
            let shown = if diff > 0 { format!("+{diff}") } else { diff.to_string() };
            stat_changes.insert(key, shown);
        }
    }

    ParsedResponse {
        narrative_text: extracted.narrative_text,
        actions: extracted.actions,
        stat_changes,
        scene_complete: extracted.scene_complete,
        name,
        effects,
    }
}

/// Same text and suggestions as [`parse_response`], without touching any state.
/// Used to redraw replies that were already applied.
pub fn preview_response(raw: &str) -> ParsedResponse {
    let extracted = extract_reply(raw);
    ParsedResponse {
        narrative_text: extracted.narrative_text,
        actions: extracted.actions,
        scene_complete: extracted.scene_complete,
        ..Default::default()
    }
}
