//! Single-purpose structural matchers over raw configuration text.
//!
//! Each matcher recognizes one declaration shape and returns typed matches
//! with byte spans into the input, so the writers can splice text without a
//! full grammar.

use std::ops::Range;
use std::sync::LazyLock;
use regex::Regex;
use shared::types::RecordType;

static TOP_LEVEL_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^option\s+([\w-]+)\s+(.+?);").expect("valid regex"));

static BLOCK_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"option\s+([\w-]+)\s+(.+?);").expect("valid regex"));

static HOST_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bhost\s+([^\s{]+)\s*\{([^}]*)\}").expect("valid regex"));

static SUBNET_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bsubnet\s+([\d.]+)\s+netmask\s+([\d.]+)\s*\{([^}]*)\}").expect("valid regex")
});

static HARDWARE_ETHERNET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"hardware\s+ethernet\s+([\w:]+)\s*;?").expect("valid regex"));

static FIXED_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fixed-address\s+([^\s;]+)\s*;?").expect("valid regex"));

static RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"range\s+([\d.]+)\s+([\d.]+)").expect("valid regex"));

static LEASE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\blease\s+([\d.]+)\s*\{([^}]*)\}").expect("valid regex"));

static CLIENT_HOSTNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"client-hostname\s+"([^"]+)""#).expect("valid regex"));

static LEASE_STARTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"starts\s+\d+\s+([\d/: ]+)").expect("valid regex"));

static LEASE_ENDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ends\s+\d+\s+([\d/: ]+)").expect("valid regex"));

static BINDING_STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*binding\s+state\s+(\w+)").expect("valid regex"));

static SERIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{10})\s*;\s*Serial").expect("valid regex"));

/// Any record line: name, optional TTL and class, type, rdata
static RECORD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)[ \t]+(?:\d+[ \t]+)?(?:IN[ \t]+)?(A|AAAA|CNAME|PTR|MX|TXT|NS)[ \t]+(.*)$")
        .expect("valid regex")
});

const TTL_CLASS: &str = r"[ \t]+(?:\d+[ \t]+)?(?:IN[ \t]+)?";

static RECORD_PATTERNS: LazyLock<[(RecordType, Regex); 7]> = LazyLock::new(|| {
    let build = |pattern: String| Regex::new(&pattern).expect("valid regex");
    [
        (RecordType::A, build(format!(r"(?m)^(\S+){TTL_CLASS}A[ \t]+([\d.]+)"))),
        (RecordType::Aaaa, build(format!(r"(?m)^(\S+){TTL_CLASS}AAAA[ \t]+(\S+)"))),
        (RecordType::Cname, build(format!(r"(?m)^(\S+){TTL_CLASS}CNAME[ \t]+(\S+)"))),
        (RecordType::Ptr, build(format!(r"(?m)^(\d+){TTL_CLASS}PTR[ \t]+(\S+)"))),
        (RecordType::Mx, build(format!(r"(?m)^(\S+){TTL_CLASS}MX[ \t]+(\d+)[ \t]+(\S+)"))),
        (RecordType::Txt, build(format!(r#"(?m)^(\S+){TTL_CLASS}TXT[ \t]+"([^"]+)""#))),
        (RecordType::Ns, build(format!(r"(?m)^(\S+){TTL_CLASS}NS[ \t]+(\S+)"))),
    ]
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDecl<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// `host <name> { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBlock<'a> {
    pub name: &'a str,
    pub body: &'a str,
    /// Whole declaration, `host` through the closing brace
    pub span: Range<usize>,
    /// Between the braces
    pub body_span: Range<usize>,
}

/// `subnet <network> netmask <mask> { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetBlock<'a> {
    pub network: &'a str,
    pub netmask: &'a str,
    pub body: &'a str,
}

/// `lease <ip> { ... }` from the leases database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseBlock<'a> {
    pub ip: &'a str,
    pub body: &'a str,
}

/// One typed record extracted from zone text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMatch<'a> {
    pub name: &'a str,
    pub record_type: RecordType,
    pub value: &'a str,
    pub priority: Option<&'a str>,
}

/// A single zone-file line recognized as a record, for in-place rewrites
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLine<'a> {
    pub name: &'a str,
    pub record_type: RecordType,
    /// Offset within the line where the rdata begins
    pub rdata_start: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialToken {
    pub value: u64,
    /// Digits through the `Serial` keyword
    pub span: Range<usize>,
}

pub fn top_level_options(text: &str) -> Vec<OptionDecl<'_>> {
    option_decls(&TOP_LEVEL_OPTION, text)
}

/// `option` statements anywhere in a block body
pub fn block_options(body: &str) -> Vec<OptionDecl<'_>> {
    option_decls(&BLOCK_OPTION, body)
}

fn option_decls<'a>(re: &Regex, text: &'a str) -> Vec<OptionDecl<'a>> {
    re.captures_iter(text)
        .filter_map(|caps| {
            Some(OptionDecl {
                name: caps.get(1)?.as_str(),
                value: caps.get(2)?.as_str(),
            })
        })
        .collect()
}

pub fn host_blocks(text: &str) -> Vec<HostBlock<'_>> {
    HOST_BLOCK
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let body = caps.get(2)?;
            Some(HostBlock {
                name: caps.get(1)?.as_str(),
                body: body.as_str(),
                span: whole.range(),
                body_span: body.range(),
            })
        })
        .collect()
}

pub fn subnet_blocks(text: &str) -> Vec<SubnetBlock<'_>> {
    SUBNET_BLOCK
        .captures_iter(text)
        .filter_map(|caps| {
            Some(SubnetBlock {
                network: caps.get(1)?.as_str(),
                netmask: caps.get(2)?.as_str(),
                body: caps.get(3)?.as_str(),
            })
        })
        .collect()
}

pub fn lease_blocks(text: &str) -> Vec<LeaseBlock<'_>> {
    LEASE_BLOCK
        .captures_iter(text)
        .filter_map(|caps| {
            Some(LeaseBlock {
                ip: caps.get(1)?.as_str(),
                body: caps.get(2)?.as_str(),
            })
        })
        .collect()
}

pub fn hardware_ethernet(body: &str) -> Option<&str> {
    first_group(&HARDWARE_ETHERNET, body)
}

/// Span of the whole `hardware ethernet ...;` statement
pub fn hardware_ethernet_span(body: &str) -> Option<Range<usize>> {
    HARDWARE_ETHERNET.find(body).map(|m| m.range())
}

pub fn fixed_address(body: &str) -> Option<&str> {
    first_group(&FIXED_ADDRESS, body)
}

/// Span of the whole `fixed-address ...;` statement
pub fn fixed_address_span(body: &str) -> Option<Range<usize>> {
    FIXED_ADDRESS.find(body).map(|m| m.range())
}

pub fn range(body: &str) -> Option<(&str, &str)> {
    let caps = RANGE.captures(body)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

pub fn client_hostname(body: &str) -> Option<&str> {
    first_group(&CLIENT_HOSTNAME, body)
}

pub fn lease_starts(body: &str) -> Option<&str> {
    first_group(&LEASE_STARTS, body).map(str::trim)
}

pub fn lease_ends(body: &str) -> Option<&str> {
    first_group(&LEASE_ENDS, body).map(str::trim)
}

/// `binding state`, ignoring `next binding state` and `rewind binding state`
pub fn binding_state(body: &str) -> Option<&str> {
    first_group(&BINDING_STATE, body)
}

fn first_group<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)?.get(1).map(|m| m.as_str())
}

/// All records of one type, in file order
pub fn records_of_type(text: &str, record_type: RecordType) -> Vec<RecordMatch<'_>> {
    let Some((_, re)) = RECORD_PATTERNS.iter().find(|(t, _)| *t == record_type) else {
        return Vec::new();
    };

    re.captures_iter(text)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            if record_type == RecordType::Mx {
                Some(RecordMatch {
                    name,
                    record_type,
                    priority: Some(caps.get(2)?.as_str()),
                    value: caps.get(3)?.as_str(),
                })
            } else {
                Some(RecordMatch {
                    name,
                    record_type,
                    value: caps.get(2)?.as_str(),
                    priority: None,
                })
            }
        })
        .collect()
}

/// Recognize a single line (without its terminator) as a record
pub fn record_line(line: &str) -> Option<RecordLine<'_>> {
    let caps = RECORD_LINE.captures(line)?;
    let record_type = caps.get(2)?.as_str().parse().ok()?;
    Some(RecordLine {
        name: caps.get(1)?.as_str(),
        record_type,
        rdata_start: caps.get(3)?.start(),
    })
}

/// First `NNNNNNNNNN ; Serial` token in a zone file
pub fn serial(text: &str) -> Option<SerialToken> {
    let caps = SERIAL.captures(text)?;
    Some(SerialToken {
        value: caps.get(1)?.as_str().parse().ok()?,
        span: caps.get(0)?.range(),
    })
}
