/// Shared utility functions for the SCIA feed
use std::path::Path;

/// Network and region properties encoded in a folder name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderProps {
    pub cod_rete: Option<String>,
    pub cod_utente_prefix: Option<String>,
    pub reghiscentral: Option<String>,
}

const NORMALIZED_REGIONS: &[(&str, &str)] = &[
    ("EmiliaRomagna", "EMILIA-ROMAGNA"),
    ("FriuliVeneziaGiulia", "FRIULI-VENEZIA GIULIA"),
    ("Liguria", "LIGURIA"),
    ("ValleAosta", "VALLE D'AOSTA"),
    ("Lombardia", "LOMBARDIA"),
    ("Veneto", "VENETO"),
    ("Piemonte", "PIEMONTE"),
    ("Sicilia", "SICILIA"),
    ("Calabria", "CALABRIA"),
    ("Trentino", "ND"),
    ("Marche", "MARCHE"),
    ("Campania", "CAMPANIA"),
    ("Bolzano", "BOLZANO"),
    ("Basilicata", "BASILICATA"),
    ("Lazio", "LAZIO"),
    ("Umbria", "UMBRIA"),
    ("Toscana", "TOSCANA"),
    ("Sardegna", "SARDEGNA"),
    ("Puglia", "PUGLIA"),
    ("Molise", "MOLISE"),
    ("Abruzzo", "ABRUZZO"),
];

/// Extract network properties from the name of the folder containing a data file
///
/// The first `_` separated token is the network code when numeric. Network 15 carries
/// a numeric station code suffix as last token.
///
/// # Examples
///
/// ```
/// use scia_feed::utils::folder2props;
///
/// let props = folder2props("15_hiscentral_13");
/// assert_eq!(props.cod_rete.as_deref(), Some("15"));
/// assert_eq!(props.cod_utente_prefix.as_deref(), Some("13"));
///
/// let props = folder2props("2_EmiliaRomagna");
/// assert_eq!(props.cod_rete.as_deref(), Some("2"));
/// assert_eq!(props.reghiscentral.as_deref(), Some("EMILIA-ROMAGNA"));
///
/// assert_eq!(folder2props("arpa19").cod_rete, None);
/// ```
pub fn folder2props(folder_name: &str) -> FolderProps {
    let mut props = FolderProps::default();
    let tokens: Vec<&str> = folder_name.split('_').collect();
    if let Some(first) = tokens.first() {
        if is_digits(first) {
            props.cod_rete = Some(first.to_string());
        }
    }
    if props.cod_rete.as_deref() == Some("15") && tokens.len() > 1 {
        if let Some(last) = tokens.last() {
            if is_digits(last) {
                props.cod_utente_prefix = Some(last.to_string());
            }
        }
    }
    for (substring, region) in NORMALIZED_REGIONS {
        if folder_name.contains(substring) {
            props.reghiscentral = Some(region.to_string());
        }
    }
    props
}

/// The last two components of a path, used to label the origin of the data
///
/// # Examples
///
/// ```
/// use scia_feed::utils::source_label;
///
/// assert_eq!(source_label("/data/arpa19/loc01_70001_201301010000_201401010000.dat"),
///            "arpa19/loc01_70001_201301010000_201401010000.dat");
/// assert_eq!(source_label("file.op"), "file.op");
/// ```
pub fn source_label(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let start = parts.len().saturating_sub(2);
    parts[start..].join("/")
}

/// Name of the folder containing a file (empty when there is none)
pub fn parent_folder_name(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File extension including the dot, as printed by the extension messages
///
/// # Examples
///
/// ```
/// use scia_feed::utils::dotted_extension;
///
/// assert_eq!(dotted_extension("a/b/file.DAT"), ".DAT");
/// assert_eq!(dotted_extension("noext"), "");
/// ```
pub fn dotted_extension(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

pub fn file_name(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parse a float accepting the decimal comma used by several Italian networks
///
/// # Examples
///
/// ```
/// use scia_feed::utils::parse_decimal;
///
/// assert_eq!(parse_decimal("1018,1"), Some(1018.1));
/// assert_eq!(parse_decimal(" 7.2 "), Some(7.2));
/// assert_eq!(parse_decimal("3A,0"), None);
/// ```
pub fn parse_decimal(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse::<f64>().ok()
}

pub fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// Round to a number of decimal digits
///
/// # Examples
///
/// ```
/// use scia_feed::utils::round_to;
///
/// assert_eq!(round_to(1.05555, 4), 1.0556);
/// assert_eq!(round_to(11.54, 1), 11.5);
/// ```
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// Read a text file tolerating bytes that are not valid UTF-8
pub fn read_text_lossy(path: impl AsRef<Path>) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    })
}

/// Split a delimited line, honouring double quoted fields
///
/// # Examples
///
/// ```
/// use scia_feed::utils::split_csv_line;
///
/// assert_eq!(split_csv_line("\"09:00:00 01/05/1930\",10.0,1", ','),
///            vec!["09:00:00 01/05/1930", "10.0", "1"]);
/// assert_eq!(split_csv_line("a;\"b;c\";", ';'), vec!["a", "b;c", ""]);
/// ```
pub fn split_csv_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// First `n` lines of a text file, without reading the rest of it
pub fn first_lines(path: impl AsRef<Path>, n: usize) -> std::io::Result<Vec<String>> {
    use std::io::BufRead;
    let mut reader = std::io::BufReader::new(std::fs::File::open(path)?);
    let mut lines = Vec::with_capacity(n);
    let mut buf = Vec::new();
    while lines.len() < n {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        lines.push(line.trim_end_matches(['\n', '\r']).to_string());
    }
    Ok(lines)
}
