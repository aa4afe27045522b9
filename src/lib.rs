pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod stats;

use env_logger::Env;
use std::sync::Once;

static LOGGER: Once = Once::new();

/// Initialise `env_logger` once; `RUST_LOG` overrides the `info` default.
pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info"))
            .format_timestamp(None)
            .init();
    });
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    //! Fixture builders shared by unit and integration tests.

    use flate2::Compression;
    use flate2::write::GzEncoder;

    /// One mbox message: envelope line, `Date`, extra headers, a short body.
    pub fn message(date: &str, headers: &[&str]) -> String {
        let mut out = String::from("From sender@example.com Mon Jan  1 00:00:00 2024\n");
        out.push_str(&format!("Date: {date}\n"));
        for header in headers {
            out.push_str(header);
            out.push('\n');
        }
        out.push_str("Subject: fixture\n\nbody\n");
        out
    }

    /// Concatenate messages built with [`message`] into mbox text.
    pub fn mbox(messages: &[String]) -> String {
        messages.concat()
    }

    /// Build a gzip-compressed tar archive from `(name, content)` pairs.
    pub fn build_tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, name, *content)
                .expect("failed to append tar entry");
        }

        builder
            .into_inner()
            .and_then(|encoder| encoder.finish())
            .expect("failed to finish tar.gz archive")
    }
}
