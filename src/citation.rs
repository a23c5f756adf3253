//! Scripture citations in running text and the URLs they point at.
//!
//! A citation is a collection code (`AN`, `Dhp`, ...), an optional roman
//! numeral, a number, an optional second number and an optional range end:
//! `AN 4.10`, `Dhp 423`, `Mv I.3.4`, `MN 10-12`. Each code has a
//! [`UrlRule`] saying how its destination is built, or that it must be
//! asked for, or that it is never linked.

use regex_lite::Regex;

use crate::error::{Error, Result};

/// Last text number of every Dhammapada chapter, in chapter order.
const DHP_LAST_TEXT_NUMBERS: [u32; 26] = [
    20, 32, 43, 59, 75, 89, 99, 115, 128, 145, 156, 166, 178, 196, 208, 220, 234, 255, 272, 289,
    305, 319, 333, 359, 382, 423,
];

/// One citation found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    /// The matched text, range end included.
    pub full_match: String,
    /// Collection code.
    pub section: String,
    /// First number when two are given, otherwise empty.
    pub subsection: String,
    pub numeral: Option<String>,
    /// The text number: the second number when two are given.
    pub text: String,
    /// `_` when there is a subsection, otherwise empty.
    pub sep: &'static str,
}

/// A citation and where it sits in the scanned text (byte offsets).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationMatch {
    pub start: usize,
    pub end: usize,
    pub citation: Citation,
}

/// How a collection code becomes a URL.
#[derive(Debug, Clone)]
pub enum UrlRule {
    /// A template with `{section}`, `{subsection}`, `{numeral}`, `{text}`
    /// and `{sep}` fields. A field may be padded: `{text:0>2}`.
    Format(String),
    Computed(fn(&Citation) -> String),
    /// No rule; the user is asked for the link.
    Manual,
    /// Never linked.
    Skip,
}

/// What to do with one citation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Url(String),
    Manual,
    Skip,
}

/// Collection codes, their rules and the pattern matching them.
#[derive(Debug, Clone)]
pub struct CitationTable {
    rules: Vec<(String, UrlRule)>,
    regex: Regex,
}

impl CitationTable {
    /// Build a table from `(code, rule)` pairs.
    ///
    /// Codes must be non-empty, alphanumeric and unique, and every format
    /// template must only use known fields.
    pub fn new<S: Into<String>>(rules: impl IntoIterator<Item = (S, UrlRule)>) -> Result<Self> {
        let rules: Vec<(String, UrlRule)> = rules.into_iter().map(|(c, r)| (c.into(), r)).collect();

        let mut codes: Vec<&str> = Vec::with_capacity(rules.len());
        for (code, rule) in &rules {
            if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(Error::Config(format!("invalid citation code '{code}'")));
            }
            if codes.contains(&code.as_str()) {
                return Err(Error::Config(format!("duplicate citation code '{code}'")));
            }
            if let UrlRule::Format(template) = rule {
                format_url(template, &Citation::placeholder())?;
            }
            codes.push(code);
        }
        if codes.is_empty() {
            return Err(Error::Config("citation table has no codes".into()));
        }

        // Longer codes first so "Snp" is not read as "Sn".
        codes.sort_by_key(|c| std::cmp::Reverse(c.len()));
        let pattern = format!(
            r"\b(?P<section>{})[\s\x{{A0}}]?(?P<numeral>[IXV]+)?[.:]?(?P<first>[0-9]+)(?:[.:](?P<second>[0-9]+))?(?:[-–](?P<end>[0-9]+))?",
            codes.join("|")
        );
        let regex = Regex::new(&pattern).map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self { rules, regex })
    }

    /// The canonical table of sutta and vinaya collections.
    pub fn standard() -> Result<Self> {
        let format = |s: &str| UrlRule::Format(s.to_string());
        Self::new([
            ("AN", format("/suttas/AN/AN{subsection}{sep}{text}.html")),
            ("MN", format("/suttas/MN/MN{text}.html")),
            ("SN", format("/suttas/SN/SN{subsection}{sep}{text}.html")),
            ("DN", format("/suttas/DN/DN{text:0>2}.html")),
            ("Dhp", UrlRule::Computed(dhp_url)),
            ("Iti", format("/suttas/KN/Iti/iti{text}.html")),
            ("Khp", format("/suttas/KN/Khp/khp{text}.html")),
            ("Sn", format("/suttas/KN/StNp/StNp{subsection}{sep}{text}.html")),
            ("Snp", format("/suttas/KN/StNp/StNp{subsection}{sep}{text}.html")),
            ("Thag", format("/suttas/KN/Thag/thag{subsection}{sep}{text}.html")),
            ("Thig", format("/suttas/KN/Thig/thig{subsection}{sep}{text}.html")),
            ("Ud", format("/suttas/KN/Ud/ud{subsection}{sep}{text}.html")),
            ("Mv", format("/vinaya/Mv/Mv{numeral}.html#pts{subsection}{sep}{text}")),
            ("Cv", UrlRule::Skip),
            ("Pr", UrlRule::Skip),
            ("Pc", UrlRule::Skip),
            ("NP", UrlRule::Skip),
            ("Sg", UrlRule::Skip),
            ("Sk", UrlRule::Skip),
        ])
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(code, _)| code.as_str())
    }

    pub fn rule(&self, code: &str) -> Option<&UrlRule> {
        self.rules.iter().find(|(c, _)| c == code).map(|(_, r)| r)
    }

    /// Every citation in `text`, left to right, without overlaps.
    pub fn find(&self, text: &str) -> Vec<CitationMatch> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let section = caps.name("section")?.as_str().to_string();
                let first = caps.name("first")?.as_str().to_string();
                let numeral = caps.name("numeral").map(|m| m.as_str().to_string());

                let (subsection, text, sep) = match caps.name("second") {
                    Some(second) => (first, second.as_str().to_string(), "_"),
                    None => (String::new(), first, ""),
                };

                Some(CitationMatch {
                    start: whole.start(),
                    end: whole.end(),
                    citation: Citation {
                        full_match: whole.as_str().to_string(),
                        section,
                        subsection,
                        numeral,
                        text,
                        sep,
                    },
                })
            })
            .collect()
    }

    /// Where `citation` should link to.
    pub fn target(&self, citation: &Citation) -> Result<Target> {
        let rule = self
            .rule(&citation.section)
            .ok_or_else(|| Error::Config(format!("no rule for citation code '{}'", citation.section)))?;
        Ok(match rule {
            UrlRule::Format(template) => Target::Url(format_url(template, citation)?),
            UrlRule::Computed(f) => Target::Url(f(citation)),
            UrlRule::Manual => Target::Manual,
            UrlRule::Skip => Target::Skip,
        })
    }
}

impl Citation {
    fn placeholder() -> Self {
        Self {
            full_match: String::new(),
            section: String::new(),
            subsection: String::new(),
            numeral: None,
            text: String::new(),
            sep: "",
        }
    }

    fn field(&self, name: &str) -> Option<&str> {
        Some(match name {
            "section" => self.section.as_str(),
            "subsection" => self.subsection.as_str(),
            "numeral" => self.numeral.as_deref().unwrap_or_default(),
            "text" => self.text.as_str(),
            "sep" => self.sep,
            _ => return None,
        })
    }
}

/// Fill a URL template from a citation.
fn format_url(template: &str, citation: &Citation) -> Result<String> {
    let bad = || Error::Config(format!("bad citation URL template '{template}'"));

    let mut out = String::with_capacity(template.len() + 8);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let close = rest[open..].find('}').ok_or_else(bad)? + open;
        let spec = &rest[open + 1..close];
        let (name, padding) = match spec.split_once(':') {
            Some((name, padding)) => (name, Some(padding)),
            None => (spec, None),
        };
        let value = citation.field(name).ok_or_else(bad)?;

        match padding {
            None => out.push_str(value),
            Some(padding) => {
                let mut chars = padding.chars();
                let (Some(fill), Some('>')) = (chars.next(), chars.next()) else {
                    return Err(bad());
                };
                let width: usize = chars.as_str().parse().map_err(|_| bad())?;
                let len = value.chars().count();
                out.extend(std::iter::repeat_n(fill, width.saturating_sub(len)));
                out.push_str(value);
            }
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Dhammapada verses live in per-chapter pages.
fn dhp_url(citation: &Citation) -> String {
    let number: u32 = citation.text.parse().unwrap_or(u32::MAX);
    let chapter = DHP_LAST_TEXT_NUMBERS.partition_point(|&last| last < number) + 1;
    format!("/suttas/KN/Dhp/Ch{chapter:02}.html#dhp{number:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first(text: &str) -> Citation {
        let table = CitationTable::standard().unwrap();
        table.find(text).remove(0).citation
    }

    fn url(text: &str) -> Target {
        let table = CitationTable::standard().unwrap();
        table.target(&first(text)).unwrap()
    }

    #[test]
    fn test_dhp_chapter_lookup() {
        assert_eq!(url("Dhp 423"), Target::Url("/suttas/KN/Dhp/Ch26.html#dhp423".into()));
        assert_eq!(url("Dhp 1"), Target::Url("/suttas/KN/Dhp/Ch01.html#dhp001".into()));
        assert_eq!(url("Dhp 21"), Target::Url("/suttas/KN/Dhp/Ch02.html#dhp021".into()));
        assert_eq!(url("Dhp 20"), Target::Url("/suttas/KN/Dhp/Ch01.html#dhp020".into()));
    }

    #[test]
    fn test_subsection_and_separator() {
        let c = first("see AN1.1 here");
        assert_eq!(c.full_match, "AN1.1");
        assert_eq!(c.subsection, "1");
        assert_eq!(c.text, "1");
        assert_eq!(c.sep, "_");
        assert_eq!(url("AN 4.10"), Target::Url("/suttas/AN/AN4_10.html".into()));
        assert_eq!(url("MN 10"), Target::Url("/suttas/MN/MN10.html".into()));
    }

    #[test]
    fn test_padding() {
        assert_eq!(url("DN 2"), Target::Url("/suttas/DN/DN02.html".into()));
        assert_eq!(url("DN 22"), Target::Url("/suttas/DN/DN22.html".into()));
    }

    #[test]
    fn test_numeral() {
        let c = first("Mv I.3.4");
        assert_eq!(c.numeral.as_deref(), Some("I"));
        assert_eq!(url("Mv I.3.4"), Target::Url("/vinaya/Mv/MvI.html#pts3_4".into()));
        assert_eq!(url("Mv 3.4"), Target::Url("/vinaya/Mv/Mv.html#pts3_4".into()));
    }

    #[test]
    fn test_range_is_part_of_match() {
        let table = CitationTable::standard().unwrap();
        let found = table.find("MN 10\u{2013}12 and SN 1.1-3.");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].citation.full_match, "MN 10\u{2013}12");
        assert_eq!(found[0].citation.text, "10");
        assert_eq!(found[1].citation.full_match, "SN 1.1-3");
    }

    #[test]
    fn test_trailing_punctuation_not_matched() {
        assert_eq!(first("as in Dhp 423.").full_match, "Dhp 423");
        assert_eq!(first("(SN 12:2)").full_match, "SN 12:2");
    }

    #[test]
    fn test_no_break_space_after_code() {
        let c = first("see SN\u{a0}12.2 and");
        assert_eq!(c.full_match, "SN\u{a0}12.2");
        assert_eq!(c.subsection, "12");
        assert_eq!(c.text, "2");
        assert_eq!(url("SN\u{a0}12.2"), Target::Url("/suttas/SN/SN12_2.html".into()));
    }

    #[test]
    fn test_longer_code_wins() {
        assert_eq!(first("Snp 4.2").section, "Snp");
        assert_eq!(first("Sn 4.2").section, "Sn");
    }

    #[test]
    fn test_skip_and_manual() {
        assert_eq!(url("Cv 1.2"), Target::Skip);
        let table = CitationTable::new([("Vism", UrlRule::Manual)]).unwrap();
        let found = table.find("Vism 12");
        assert_eq!(table.target(&found[0].citation).unwrap(), Target::Manual);
    }

    #[test]
    fn test_no_match_inside_words() {
        let table = CitationTable::standard().unwrap();
        assert!(table.find("SCAN 1 and MAN 2").is_empty());
        assert!(table.find("no citations here").is_empty());
    }

    #[test]
    fn test_invalid_tables() {
        assert!(CitationTable::new([("A|B", UrlRule::Skip)]).is_err());
        assert!(CitationTable::new([("AN", UrlRule::Skip), ("AN", UrlRule::Skip)]).is_err());
        assert!(CitationTable::new([("AN", UrlRule::Format("/{chapter}".into()))]).is_err());
        assert!(CitationTable::new(Vec::<(String, UrlRule)>::new()).is_err());
    }
}
