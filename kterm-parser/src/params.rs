//! CSI parameter parsing
//!
//! Handles parsing of semicolon-separated numeric parameters in CSI sequences,
//! including colon subparameters (`38:2:r:g:b`) and the DEC private `?` prefix.

/// Maximum number of parameters we'll track
pub const MAX_PARAMS: usize = 32;

/// CSI parameters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    /// Parameter values (0 means default/unspecified)
    values: Vec<u16>,
    /// Subparameters following each value (for colon-separated values like SGR)
    subparams: Vec<Vec<u16>>,
    /// Leading `?` was present
    private: bool,
}

fn parse_number(token: &[u8]) -> u16 {
    token
        .iter()
        .filter(|b| b.is_ascii_digit())
        .fold(0u16, |acc, &b| acc.saturating_mul(10).saturating_add((b - b'0') as u16))
}

impl Params {
    /// Create empty params
    pub fn new() -> Self {
        Self::default()
    }

    /// Create params from a slice
    pub fn from_slice(values: &[u16]) -> Self {
        Self {
            values: values.iter().copied().take(MAX_PARAMS).collect(),
            subparams: vec![Vec::new(); values.len().min(MAX_PARAMS)],
            private: false,
        }
    }

    /// Parse parameters from bytes.
    ///
    /// An empty input yields no parameters; empty tokens become 0. A leading
    /// `?` is stripped and recorded as the private flag.
    pub fn parse(bytes: &[u8]) -> Self {
        let mut params = Self::new();
        let bytes = match bytes.split_first() {
            Some((b'?', rest)) => {
                params.private = true;
                rest
            }
            _ => bytes,
        };
        if bytes.is_empty() {
            return params;
        }

        for group in bytes.split(|&b| b == b';') {
            if params.values.len() == MAX_PARAMS {
                log::trace!("CSI parameter list truncated at {}", MAX_PARAMS);
                break;
            }
            let mut parts = group.split(|&b| b == b':');
            let value = parts.next().map(parse_number).unwrap_or(0);
            params.values.push(value);
            params.subparams.push(parts.map(parse_number).collect());
        }

        params
    }

    /// Get parameter at index, returning None if absent or zero
    pub fn get(&self, index: usize) -> Option<u16> {
        self.values.get(index).copied().filter(|&v| v != 0)
    }

    /// Get parameter at index with default value
    pub fn get_or(&self, index: usize, default: u16) -> u16 {
        self.get(index).unwrap_or(default)
    }

    /// Get raw value at index (0 if not present)
    pub fn raw(&self, index: usize) -> u16 {
        self.values.get(index).copied().unwrap_or(0)
    }

    /// Get number of parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the list carried a leading `?`
    pub fn is_private(&self) -> bool {
        self.private
    }

    /// Get subparameters for a parameter
    pub fn subparams(&self, index: usize) -> Option<&[u16]> {
        self.subparams
            .get(index)
            .map(|v| v.as_slice())
            .filter(|v| !v.is_empty())
    }

    /// Iterate over parameters
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.values.iter().copied()
    }

    /// Iterate over parameters with subparameters
    pub fn iter_with_subparams(&self) -> impl Iterator<Item = (u16, &[u16])> + '_ {
        self.values.iter().enumerate().map(move |(i, &v)| {
            let subparams = self.subparams.get(i).map(|v| v.as_slice()).unwrap_or(&[]);
            (v, subparams)
        })
    }

    /// All values as a slice
    pub fn as_slice(&self) -> &[u16] {
        &self.values
    }
}
