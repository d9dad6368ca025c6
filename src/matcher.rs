//! Rule compiler and compiled matcher shapes
//!
//! A declarative style configuration compiles into a closed set of matcher
//! shapes over per-page token windows:
//! - `list`: literal/set prefix tokens, optional postfix constraints, join
//! - `header`: prefix matched as a string prefix of single tokens
//! - `change`: prefix plus a unary numeric transform
//! - locator (writeback side): prefix anchor plus insertion geometry
//!
//! Compiled rules are pure data; matching mutates only the target slot.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{
    HandlerConfig, LocatorConfig, MatcherConfig, PatternConfig, StyleConfig,
};
use crate::pagination::PageNumbering;
use crate::params::{ParamGroup, ParamSlot, ParamValue, SlotId, CATALOG_SLOTS};
use crate::token::{Color, Point, Token};
use crate::DatasheetError;

/// Strictly-decimal text: digits with at most one dot
static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)?$").unwrap());

/// Parse text a unit-bearing slot will accept; anything else is a no-match
pub fn parse_decimal(text: &str) -> Option<f64> {
    if !DECIMAL_RE.is_match(text) {
        return None;
    }
    text.parse().ok()
}

/// Strip one trailing site character (half- or full-width colon) before a
/// token is compared against a checked pattern
pub fn strip_site_char(text: &str) -> &str {
    text.strip_suffix(':')
        .or_else(|| text.strip_suffix('：'))
        .unwrap_or(text)
}

/// One checked prefix/postfix element; wildcard positions are `None` in the
/// surrounding vector
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Literal(String),
    OneOf(Vec<String>),
}

impl Pattern {
    fn matches(&self, text: &str) -> bool {
        match self {
            Pattern::Literal(lit) => text == lit,
            Pattern::OneOf(set) => set.iter().any(|lit| text == lit),
        }
    }
}

/// Result of a successful match attempt
///
/// "No match at this window" is the `None` of the surrounding `Option`; the
/// caller then tries the next window position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Matched; the scan must skip the next `n` positions and stop trying
    /// other rules at this one
    Consumed(usize),
    /// Matched without consuming; other rules may still fire here
    Matched,
}

/// A compiled extraction matcher
#[derive(Debug, Clone)]
pub enum Matcher {
    List {
        pre: Vec<Option<Pattern>>,
        post: Vec<Option<Pattern>>,
        to_join: usize,
        skip: bool,
    },
    Header {
        pre: Vec<Option<String>>,
        to_join: usize,
        skip: bool,
    },
    Change {
        pre: Vec<Option<Pattern>>,
        factor: f64,
    },
}

impl Matcher {
    /// Attempt this rule against the token window starting at the current
    /// scan position, capturing into `slot` on success
    pub fn try_match(&self, window: &[Token], slot: &mut ParamSlot) -> Option<MatchOutcome> {
        match self {
            Matcher::List {
                pre,
                post,
                to_join,
                skip,
            } => match_list(pre, post, *to_join, *skip, window, slot),
            Matcher::Header { pre, to_join, skip } => {
                match_header(pre, *to_join, *skip, window, slot)
            }
            Matcher::Change { pre, factor } => match_change(pre, *factor, window, slot),
        }
    }
}

/// Check a list-style prefix run; `None` elements consume a position unchecked
fn check_prefix(pre: &[Option<Pattern>], window: &[Token]) -> Option<()> {
    for (i, check) in pre.iter().enumerate() {
        let Some(pattern) = check else { continue };
        let text = strip_site_char(&window.get(i)?.text);
        if !pattern.matches(text) {
            return None;
        }
    }
    Some(())
}

/// Store captured text into the slot, coercing when the slot is unit-tagged
///
/// Returns `None` when a unit-tagged slot's text is not decimal; the caller
/// treats that as a no-match, leaving the rule queued for a later page.
fn assign(slot: &mut ParamSlot, text: String) -> Option<()> {
    if slot.unit().is_some() {
        let value = parse_decimal(&text)?;
        slot.set_value(ParamValue::Number(value));
    } else {
        slot.set_value(ParamValue::Text(text));
    }
    Some(())
}

fn consume(prefix_len: usize, skip: bool) -> MatchOutcome {
    if skip {
        MatchOutcome::Consumed(prefix_len.saturating_sub(1))
    } else {
        MatchOutcome::Matched
    }
}

fn match_list(
    pre: &[Option<Pattern>],
    post: &[Option<Pattern>],
    to_join: usize,
    skip: bool,
    window: &[Token],
    slot: &mut ParamSlot,
) -> Option<MatchOutcome> {
    let p = pre.len();
    if p + post.len() > window.len() {
        return None;
    }
    check_prefix(pre, window)?;

    for (j, check) in post.iter().enumerate() {
        let Some(pattern) = check else { continue };
        let text = strip_site_char(&window.get(p + 1 + j)?.text);
        // an empty postfix token is a pass, matching upstream token splitting
        if text.is_empty() {
            continue;
        }
        if !pattern.matches(text) {
            return None;
        }
    }

    let mut captured = window.get(p)?.text.clone();
    for k in 1..=to_join {
        captured.push_str(&window.get(p + k)?.text);
    }
    assign(slot, captured)?;
    Some(consume(p, skip))
}

fn match_header(
    pre: &[Option<String>],
    to_join: usize,
    skip: bool,
    window: &[Token],
    slot: &mut ParamSlot,
) -> Option<MatchOutcome> {
    let p = pre.len();
    if p > window.len() {
        return None;
    }

    // the remainder offset comes from the last checked prefix element
    let mut matched_len = 0;
    for (i, check) in pre.iter().enumerate() {
        let Some(lit) = check else { continue };
        if !window[i].text.starts_with(lit.as_str()) {
            return None;
        }
        matched_len = lit.len();
    }

    let base = window.get(p.checked_sub(1)?)?;
    let mut captured = base.text.get(matched_len..)?.to_string();
    for k in 0..to_join {
        captured.push_str(&window.get(p + k)?.text);
    }
    assign(slot, captured)?;
    Some(consume(p, skip))
}

fn match_change(
    pre: &[Option<Pattern>],
    factor: f64,
    window: &[Token],
    slot: &mut ParamSlot,
) -> Option<MatchOutcome> {
    let p = pre.len();
    if p > window.len() {
        return None;
    }
    check_prefix(pre, window)?;

    let value = parse_decimal(&window.get(p)?.text)? * factor;
    slot.set_value(ParamValue::Number(value));
    // derived values never consume; overlapping rules may still fire here
    Some(MatchOutcome::Matched)
}

/// Insertion direction of a locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Beside the anchor: x from its right edge, y from its vertical midpoint
    Horizontal,
    /// Below the anchor: x from its horizontal midpoint, y from its bottom
    Vertical,
}

/// Global writeback styling shared by all locators of one style
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteStyle {
    pub font_size: f32,
    pub h_bias: f32,
    pub v_bias: f32,
    pub color: Color,
}

/// A compiled writeback locator: finds an anchor and computes the insertion
/// point instead of capturing a value
#[derive(Debug, Clone)]
pub struct Locator {
    pre: Vec<Option<Pattern>>,
    offset: f32,
    skip: bool,
    cjk: bool,
    dir: Direction,
}

impl Locator {
    pub fn new(
        pre: Vec<Option<Pattern>>,
        offset: f32,
        skip: bool,
        cjk: bool,
        dir: Direction,
    ) -> Self {
        Locator {
            pre,
            offset,
            skip,
            cjk,
            dir,
        }
    }

    /// Whether insertions from this locator request a CJK-capable font
    pub fn cjk(&self) -> bool {
        self.cjk
    }

    /// Attempt to anchor at this window; on success return the insertion
    /// point and the consumption outcome
    pub fn try_locate(&self, window: &[Token], style: &WriteStyle) -> Option<(Point, MatchOutcome)> {
        let p = self.pre.len();
        if p > window.len() {
            return None;
        }

        let mut anchor: Option<&Token> = None;
        for (i, check) in self.pre.iter().enumerate() {
            let Some(pattern) = check else { continue };
            let token = &window[i];
            if !pattern.matches(strip_site_char(&token.text)) {
                return None;
            }
            anchor = Some(token);
        }
        // an all-wildcard prefix has nothing to anchor on
        let anchor = anchor?;

        let at = match self.dir {
            Direction::Horizontal => Point {
                x: anchor.right + self.offset,
                y: anchor.mid_y() + style.v_bias,
            },
            Direction::Vertical => Point {
                x: anchor.mid_x() - style.h_bias,
                y: anchor.bottom + self.offset,
            },
        };
        Some((at, consume(p, self.skip)))
    }
}

/// One fully compiled style: extraction matchers addressed by slot identity,
/// writeback locators addressed by catalog index, and global styling
#[derive(Debug, Clone)]
pub struct CompiledStyle {
    pub page_num: PageNumbering,
    pub matchers: Vec<(SlotId, Matcher)>,
    pub locators: Vec<(usize, Locator)>,
    pub write_style: WriteStyle,
}

fn compile_pattern(cfg: &PatternConfig) -> Pattern {
    match cfg {
        PatternConfig::One(lit) => Pattern::Literal(lit.clone()),
        PatternConfig::Any(set) => Pattern::OneOf(set.clone()),
    }
}

fn compile_patterns(cfg: &[Option<PatternConfig>]) -> Vec<Option<Pattern>> {
    cfg.iter()
        .map(|p| p.as_ref().map(compile_pattern))
        .collect()
}

fn compile_matcher(cfg: &MatcherConfig) -> Result<Matcher, DatasheetError> {
    match cfg {
        MatcherConfig::List {
            pre,
            post,
            to_join,
            skip,
        } => Ok(Matcher::List {
            pre: compile_patterns(pre),
            post: post.as_deref().map(compile_patterns).unwrap_or_default(),
            to_join: *to_join,
            skip: *skip,
        }),
        MatcherConfig::Header { pre, to_join, skip } => {
            let pre = pre
                .iter()
                .map(|p| match p {
                    None => Ok(None),
                    Some(PatternConfig::One(lit)) => Ok(Some(lit.clone())),
                    Some(PatternConfig::Any(_)) => Err(DatasheetError::Config(
                        "header prefixes must be literal strings".to_string(),
                    )),
                })
                .collect::<Result<_, _>>()?;
            Ok(Matcher::Header {
                pre,
                to_join: *to_join,
                skip: *skip,
            })
        }
        MatcherConfig::Change { pre, handler } => {
            let HandlerConfig::Factor { arg } = handler;
            Ok(Matcher::Change {
                pre: compile_patterns(pre),
                factor: *arg,
            })
        }
    }
}

fn compile_locator(cfg: &LocatorConfig) -> Result<Locator, DatasheetError> {
    let dir = match cfg.dir {
        0 => Direction::Horizontal,
        1 => Direction::Vertical,
        other => {
            return Err(DatasheetError::Config(format!(
                "locator dir must be 0 or 1, got {}",
                other
            )))
        }
    };
    Ok(Locator::new(
        compile_patterns(&cfg.pre),
        cfg.offset,
        cfg.skip,
        cfg.is_cn,
        dir,
    ))
}

/// Compile one style's configuration into executable rules
///
/// Shape errors (too many groups, out-of-range slots, bad directions) are
/// configuration errors raised here, before any document is processed.
pub fn compile_style(cfg: &StyleConfig) -> Result<CompiledStyle, DatasheetError> {
    let mut matchers = Vec::new();
    for (g, group_cfg) in cfg.extract.matchers.iter().enumerate() {
        let group = ParamGroup::from_index(g).ok_or_else(|| {
            DatasheetError::Config(format!(
                "matcher table has {} groups, only {} parameter groups exist",
                cfg.extract.matchers.len(),
                ParamGroup::ALL.len()
            ))
        })?;
        if group_cfg.len() > group.slot_count() {
            return Err(DatasheetError::Config(format!(
                "group {} declares {} matchers for {} slots",
                g,
                group_cfg.len(),
                group.slot_count()
            )));
        }
        for (j, matcher_cfg) in group_cfg.iter().enumerate() {
            if let Some(matcher_cfg) = matcher_cfg {
                matchers.push(((group, j), compile_matcher(matcher_cfg)?));
            }
        }
    }

    let locator_cfgs = &cfg.writeback.matchers;
    if locator_cfgs.len() > CATALOG_SLOTS {
        return Err(DatasheetError::Config(format!(
            "writeback declares {} locators for {} catalog slots",
            locator_cfgs.len(),
            CATALOG_SLOTS
        )));
    }
    let mut locators = Vec::new();
    for (index, locator_cfg) in locator_cfgs.iter().enumerate() {
        if let Some(locator_cfg) = locator_cfg {
            locators.push((index, compile_locator(locator_cfg)?));
        }
    }

    Ok(CompiledStyle {
        page_num: cfg.page_num,
        matchers,
        locators,
        write_style: WriteStyle {
            font_size: cfg.writeback.font_size,
            h_bias: cfg.writeback.h_pos,
            v_bias: cfg.writeback.v_pos,
            color: cfg.writeback.font_color.resolve()?,
        },
    })
}
