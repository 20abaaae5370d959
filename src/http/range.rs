//! Single byte-range requests and their page-aligned mapping windows.

/// Granularity that a mapping's file offset has to respect.
pub const PAGE_SIZE: u64 = 4096;

/// A `Range: bytes=<start>-<end>` request as sent by the client.
///
/// Either bound may be missing. `bytes=500-` is open-ended, `bytes=-500`
/// asks for the last 500 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeSpec {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl RangeSpec {
    pub fn new(start: Option<u64>, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Parses the value of a `Range` header.
    ///
    /// Only the `bytes` unit and a single range are understood; anything else
    /// yields `None` and the request is served as a plain full reply.
    pub fn parse(value: &str) -> Option<Self> {
        let spec = value.trim().strip_prefix("bytes=")?;
        if spec.contains(',') {
            return None;
        }

        let (start, end) = spec.split_once('-')?;
        Some(Self {
            start: parse_bound(start)?,
            end: parse_bound(end)?,
        })
    }
}

fn parse_bound(s: &str) -> Option<Option<u64>> {
    let s = s.trim();
    if s.is_empty() {
        return Some(None);
    }
    s.parse().ok().map(Some)
}

/// The client-visible, inclusive byte window `[start, end]` of a partial reply.
///
/// The mapping start and the alignment offset are always derived from
/// `start`, never stored next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    start: u64,
    end: u64,
}

impl ByteWindow {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// First byte the client asked for.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last byte the client asked for.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Bytes between the page boundary and the client-visible start.
    pub fn offset(&self) -> u64 {
        self.start % PAGE_SIZE
    }

    /// File offset the mapping begins at.
    pub fn map_start(&self) -> u64 {
        self.start - self.offset()
    }

    /// Number of bytes sent to the client.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Number of bytes that have to be mapped to cover the window.
    pub fn map_len(&self) -> u64 {
        self.len() + self.offset()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeResolution {
    /// 416: the range does not fit the file.
    Unsatisfiable,
    /// 200: serve the whole file.
    Full,
    /// 206: serve the window.
    Partial(ByteWindow),
}

/// Resolves a range request against a file of `file_size` bytes.
///
/// `stale` is set when the client sent an Etag that does not match the
/// current one; its cached copy is then outdated and the full file is sent.
pub fn resolve(spec: RangeSpec, file_size: u64, stale: bool) -> RangeResolution {
    let out_of_bounds = spec
        .start
        .into_iter()
        .chain(spec.end)
        .max()
        .is_some_and(|bound| bound >= file_size);
    let inverted = matches!((spec.start, spec.end), (Some(s), Some(e)) if s > e);
    if out_of_bounds || inverted {
        return RangeResolution::Unsatisfiable;
    }

    match (spec.start, spec.end) {
        (None, None) => RangeResolution::Full,
        _ if stale => RangeResolution::Full,
        (Some(start), None) => RangeResolution::Partial(ByteWindow::new(start, file_size - 1)),
        // bytes=-0 selects nothing
        (None, Some(0)) => RangeResolution::Unsatisfiable,
        (None, Some(suffix)) => {
            RangeResolution::Partial(ByteWindow::new(file_size - suffix, file_size - 1))
        }
        (Some(start), Some(end)) => RangeResolution::Partial(ByteWindow::new(start, end)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bounds() {
        assert_eq!(RangeSpec::parse("bytes=0-"), Some(RangeSpec::new(Some(0), None)));
        assert_eq!(RangeSpec::parse("bytes=-500"), Some(RangeSpec::new(None, Some(500))));
        assert_eq!(RangeSpec::parse("bytes=10-20"), Some(RangeSpec::new(Some(10), Some(20))));
        assert_eq!(RangeSpec::parse("bytes=-"), Some(RangeSpec::new(None, None)));
    }

    #[test]
    fn parse_rejects_other_units_and_lists() {
        assert_eq!(RangeSpec::parse("items=0-1"), None);
        assert_eq!(RangeSpec::parse("bytes=0-1,4-5"), None);
        assert_eq!(RangeSpec::parse("bytes=a-b"), None);
        assert_eq!(RangeSpec::parse("bytes=12"), None);
    }

    #[test]
    fn window_alignment_is_derived_from_start() {
        let window = ByteWindow::new(5000, 9999);
        assert_eq!(window.offset(), 904);
        assert_eq!(window.map_start(), 4096);
        assert_eq!(window.len(), 5000);
        assert_eq!(window.map_len(), 5904);
    }

    #[test]
    fn resolve_inverted_range() {
        let spec = RangeSpec::new(Some(20), Some(10));
        assert_eq!(resolve(spec, 100, false), RangeResolution::Unsatisfiable);
    }

    #[test]
    fn resolve_suffix_range() {
        let spec = RangeSpec::new(None, Some(100));
        assert_eq!(
            resolve(spec, 1000, false),
            RangeResolution::Partial(ByteWindow::new(900, 999))
        );
        assert_eq!(resolve(RangeSpec::new(None, Some(0)), 1000, false), RangeResolution::Unsatisfiable);
    }

    #[test]
    fn resolve_stale_etag_wins_over_range() {
        let spec = RangeSpec::new(Some(10), None);
        assert_eq!(resolve(spec, 1000, true), RangeResolution::Full);
    }

    #[test]
    fn resolve_empty_file() {
        assert_eq!(resolve(RangeSpec::new(Some(0), None), 0, false), RangeResolution::Unsatisfiable);
        assert_eq!(resolve(RangeSpec::new(None, None), 0, false), RangeResolution::Full);
    }
}
