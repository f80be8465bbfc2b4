//! Stata-compatible variable names and labels.
//!
//! Stata (format 117) wants ASCII identifiers of at most 32 bytes and ASCII labels
//! of at most 80 bytes. Source headers are frequently Chinese, so we
//! map well-known headers directly, transliterate common terms, and strip
//! whatever is left.

use std::collections::HashSet;

/// Maximum variable-name length in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// Maximum variable-label length in bytes.
pub const MAX_LABEL_LEN: usize = 80;

/// Direct header -> name mapping for the common statistical-bureau exports.
const COLUMN_MAPPING: &[(&str, &str)] = &[
    ("月份", "month"),
    ("季度", "quarter"),
    ("年份", "year"),
    ("报告日", "report_date"),
    ("日期", "date_cn"),
    ("全国-当月", "cpi_national"),
    ("全国-同比增长", "cpi_national_yoy"),
    ("全国-环比增长", "cpi_national_mom"),
    ("全国-累计", "cpi_national_cum"),
    ("城市-当月", "cpi_urban"),
    ("城市-同比增长", "cpi_urban_yoy"),
    ("农村-当月", "cpi_rural"),
    ("农村-同比增长", "cpi_rural_yoy"),
    ("当月", "ppi_current"),
    ("当月同比增长", "ppi_yoy"),
    ("累计", "ppi_cum"),
    ("国内生产总值-绝对值", "gdp_value"),
    ("国内生产总值-同比增长", "gdp_yoy"),
    ("第一产业-绝对值", "gdp_primary_value"),
    ("第一产业-同比增长", "gdp_primary_yoy"),
    ("第二产业-绝对值", "gdp_secondary_value"),
    ("第二产业-同比增长", "gdp_secondary_yoy"),
    ("第三产业-绝对值", "gdp_tertiary_value"),
    ("第三产业-同比增长", "gdp_tertiary_yoy"),
    ("制造业-指数", "pmi_mfg"),
    ("制造业-同比增长", "pmi_mfg_yoy"),
];

/// Term transliterations, longest terms first so compounds win.
const TERMS: &[(&str, &str)] = &[
    ("非制造业", "feizhizaoye"),
    ("制造业", "zhizaoye"),
    ("准货币", "zhunhuobi"),
    ("货币", "huobi"),
    ("数量", "shuliang"),
    ("同比", "tongbi"),
    ("环比", "huanbi"),
    ("增长", "zengzhang"),
    ("累计", "leiji"),
    ("当月", "dangyue"),
    ("绝对值", "juedui"),
    ("产业", "chanye"),
    ("指数", "zhishu"),
    ("企业", "qiye"),
    ("景气", "jingqi"),
    ("信心", "xinxin"),
    ("报告", "baogao"),
    ("日", "ri"),
];

/// Names Stata reserves for itself.
const RESERVED: &[&str] = &[
    "_all", "_b", "byte", "_coef", "_cons", "double", "float", "if", "in", "int", "long", "_n",
    "_N", "_pi", "_pred", "_rc", "_skip", "str", "strL", "using", "with",
];

/// Map one header to a valid Stata name (not yet de-duplicated).
pub fn sanitize_name(original: &str) -> String {
    let original = original.trim();
    if let Some((_, mapped)) = COLUMN_MAPPING.iter().find(|(cn, _)| *cn == original) {
        return (*mapped).to_string();
    }

    let transliterated = transliterate(original);
    let mut out = String::with_capacity(transliterated.len());
    let mut last_underscore = false;
    for ch in transliterated.chars() {
        let ch = if ch.is_ascii_alphanumeric() {
            ch.to_ascii_lowercase()
        } else if ch.is_ascii() {
            '_'
        } else {
            // Remaining non-ASCII is dropped outright.
            continue;
        };
        if ch == '_' {
            if last_underscore {
                continue;
            }
            last_underscore = true;
        } else {
            last_underscore = false;
        }
        out.push(ch);
    }

    let mut name = out.trim_matches('_').to_string();
    if name.is_empty() {
        name = "var".to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, 'v');
    }
    name.truncate(MAX_NAME_LEN);

    if is_reserved(&name) {
        name.truncate(MAX_NAME_LEN - 1);
        name.push('_');
    }
    name
}

/// Sanitize a whole header row, appending `_1`, `_2`, ... to repeated names.
pub fn unique_names(originals: &[String]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(originals.len());
    for original in originals {
        let base = sanitize_name(original);
        let mut candidate = base.clone();
        let mut counter = 1;
        while used.contains(&candidate) {
            let suffix = format!("_{counter}");
            let mut stem = base.clone();
            stem.truncate(MAX_NAME_LEN - suffix.len());
            candidate = format!("{stem}{suffix}");
            counter += 1;
        }
        used.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// Printable-ASCII variable label derived from the original header.
pub fn ascii_label(original: &str, fallback: &str) -> String {
    let transliterated = transliterate(original.trim());
    let mut label: String = transliterated
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect();
    label = label.trim().to_string();
    if label.is_empty() {
        label = fallback.to_string();
    }
    label.truncate(MAX_LABEL_LEN);
    label
}

fn transliterate(s: &str) -> String {
    let mut out = s.to_string();
    for (cn, latin) in TERMS {
        out = out.replace(cn, latin);
    }
    out
}

fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name) || is_str_type_name(name)
}

/// `str1` .. `str2045` are type names.
fn is_str_type_name(name: &str) -> bool {
    name.strip_prefix("str")
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
