use crate::config::InputConfig;
use crate::engine::UrlTask;
use crate::url::expand_line;
use futures::Stream;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tokio::sync::mpsc;

/// Lazy, line-oriented URL source
///
/// Yields one [`UrlTask`] per input line, numbered from 0 without gaps.
/// Bytes that are not valid UTF-8 are replaced with U+FFFD, so a corrupt
/// line still yields a task (which then classifies as invalid). Only a real
/// read error is yielded as `Err`, once, and ends the scan.
pub struct UrlSource<R> {
    reader: R,
    options: InputConfig,
    buf: Vec<u8>,
    line_no: u64,
    next_seq: u64,
    seen: Option<HashSet<String>>,
    duplicates: u64,
}

impl UrlSource<Box<dyn BufRead + Send>> {
    /// Opens a URL list file; `-` reads standard input
    ///
    /// # Returns
    ///
    /// * `Ok(UrlSource)` - The input is open
    /// * `Err(io::Error)` - The file could not be opened
    pub fn open(path: &Path, options: InputConfig) -> io::Result<Self> {
        let reader: Box<dyn BufRead + Send> = if path == Path::new("-") {
            Box::new(BufReader::new(io::stdin()))
        } else {
            Box::new(BufReader::new(File::open(path)?))
        };
        Ok(Self::from_reader(reader, options))
    }
}

impl<R: BufRead> UrlSource<R> {
    pub fn from_reader(reader: R, options: InputConfig) -> Self {
        // The dedupe set grows with the number of distinct URLs
        let seen = options.dedupe.then(HashSet::new);
        Self {
            reader,
            options,
            buf: Vec::new(),
            line_no: 0,
            next_seq: 0,
            seen,
            duplicates: 0,
        }
    }

    /// Number of lines read so far
    pub fn lines_read(&self) -> u64 {
        self.line_no
    }

    /// Number of repeated URLs dropped by `dedupe`
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}

impl<R: BufRead> Iterator for UrlSource<R> {
    type Item = io::Result<UrlTask>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
            self.line_no += 1;

            let line = String::from_utf8_lossy(&self.buf);
            let trimmed = line.trim();
            if self.options.skip_comments && trimmed.starts_with('#') {
                continue;
            }

            let (url, fallback) = expand_line(trimmed, self.options.default_scheme);

            if let Some(seen) = &mut self.seen {
                // Blank lines are never duplicates; each one yields its own result
                if !url.is_empty() && !seen.insert(url.clone()) {
                    tracing::trace!("Skipping duplicate URL on line {}: {}", self.line_no, url);
                    self.duplicates += 1;
                    continue;
                }
            }

            let task = UrlTask::new(self.next_seq, url).with_fallback(fallback);
            self.next_seq += 1;
            return Some(Ok(task));
        }
    }
}

impl<R: BufRead + Send + 'static> UrlSource<R> {
    /// Moves the source onto a dedicated reader thread
    ///
    /// Tasks arrive through a bounded channel of `capacity` slots, so a slow
    /// or blocking reader (an idle stdin pipe) never stalls the scheduler and
    /// the reader runs at most `capacity` tasks ahead of admission. The thread
    /// stops after the first read error or once the stream is dropped.
    pub fn into_stream(
        mut self,
        capacity: usize,
    ) -> io::Result<impl Stream<Item = io::Result<UrlTask>> + Send + Unpin> {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));

        std::thread::Builder::new()
            .name("url-source".to_string())
            .spawn(move || {
                while let Some(item) = self.next() {
                    let failed = item.is_err();
                    if tx.blocking_send(item).is_err() || failed {
                        break;
                    }
                }
                tracing::debug!("URL source read {} lines", self.line_no);
                if self.duplicates > 0 {
                    tracing::info!("Dropped {} duplicate URLs", self.duplicates);
                }
            })?;

        Ok(futures::stream::poll_fn(move |cx| rx.poll_recv(cx)))
    }
}

/// Builds an in-memory source numbered from 0
pub fn tasks_from_urls<I>(urls: I) -> impl Stream<Item = io::Result<UrlTask>>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    futures::stream::iter(
        urls.into_iter()
            .enumerate()
            .map(|(seq, url)| Ok(UrlTask::new(seq as u64, url))),
    )
}
