//! # npmesh Fetch
//!
//! Retrieval of nanopubs and whole index trees from the registry federation.
//!
//! ## Features
//!
//! - **Hedged races**: sub-indexes and appended indexes are requested three
//!   times at once; the first verified copy wins
//! - **Load balancing**: registries are shuffled per attempt and capped at
//!   five concurrent requests each
//! - **Resilience**: a failed attempt moves on to an untried registry
//! - **Local store**: a trusted store is consulted before any registry
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use npmesh_core::{ContentAddress, NoopListener, Nanopub, TrigCodec};
//! use npmesh_directory::RegistryDirectory;
//! use npmesh_fetch::ContentFetcher;
//!
//! # async fn example() -> npmesh_core::Result<()> {
//! let fetcher = ContentFetcher::new(Arc::new(RegistryDirectory::new()), Arc::new(TrigCodec));
//! let root = ContentAddress::parse("RAdG9VXVOBq-7Ju5H085CgynfrVlwpajLb02B-W0ko_5M")?;
//! let mut sink: Vec<Nanopub> = Vec::new();
//! let report = fetcher.fetch(&root, true, &mut sink, &NoopListener).await?;
//! println!("{} nanopubs", report.written);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

mod config;
mod engine;
mod race;
mod single;
mod sink;

pub use config::FetchConfig;
pub use engine::{ContentFetcher, FetchReport};
pub use race::RaceGroup;
pub use sink::WriterSink;

#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use npmesh_core::constants::*;
    use npmesh_core::{ContentAddress, FetchListener, Nanopub, NpmeshError, Quad, TrigCodec};
    use npmesh_directory::{DirectoryConfig, RegistryDirectory};

    pub fn code(name: &str) -> String {
        format!("RA{:0>43}", name)
    }

    pub fn uri(name: &str) -> String {
        format!("https://w3id.org/np/{}", code(name))
    }

    pub fn address(name: &str) -> ContentAddress {
        ContentAddress::parse(&code(name)).unwrap()
    }

    fn head(uri: &str) -> Quad {
        Quad::new(uri, RDF_TYPE, NANOPUBLICATION, format!("{}#Head", uri))
    }

    pub fn plain(name: &str) -> Nanopub {
        Nanopub::from_quads(&TrigCodec, vec![head(&uri(name))]).unwrap()
    }

    pub fn index(name: &str, elements: &[&str], subs: &[&str], appended: Option<&str>) -> Nanopub {
        let np = uri(name);
        let graph = format!("{}#assertion", np);
        let mut quads = vec![
            head(&np),
            Quad::new(&np, RDF_TYPE, NANOPUB_INDEX, format!("{}#pubinfo", np)),
        ];
        for e in elements {
            quads.push(Quad::new(&np, INCLUDES_ELEMENT, uri(e), graph.as_str()));
        }
        for s in subs {
            quads.push(Quad::new(&np, INCLUDES_SUBINDEX, uri(s), graph.as_str()));
        }
        if let Some(a) = appended {
            quads.push(Quad::new(&np, APPENDS_INDEX, uri(a), format!("{}#pubinfo", np)));
        }
        Nanopub::from_quads(&TrigCodec, quads).unwrap()
    }

    /// Starts a mock registry serving its descriptor and the given nanopubs.
    pub async fn registry(nanopubs: &[&Nanopub]) -> (MockServer, String) {
        let server = MockServer::start().await;
        let url = format!("{}/", server.uri());
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "publicUrl": &url,
                "protocolVersion": "0.3",
                "postNanopubsEnabled": true
            })))
            .mount(&server)
            .await;
        for np in nanopubs {
            serve(&server, np).await;
        }
        (server, url)
    }

    /// Serves `np` as TriG; requests not asking for TriG get a 404.
    pub async fn serve(server: &MockServer, np: &Nanopub) {
        Mock::given(method("GET"))
            .and(path(format!("/np/{}", np.address())))
            .and(header("accept", "application/trig"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(np.body().to_vec()))
            .mount(server)
            .await;
    }

    pub fn directory(urls: Vec<String>) -> Arc<RegistryDirectory> {
        let config = DirectoryConfig::default()
            .no_cache_file()
            .with_blocklist(vec![])
            .with_registries(urls);
        Arc::new(RegistryDirectory::with_config(config))
    }

    /// Records every listener callback.
    #[derive(Default)]
    pub struct RecordingListener {
        pub progress: Mutex<Vec<u64>>,
        pub errors: Mutex<Vec<(String, Option<String>, String)>>,
    }

    impl RecordingListener {
        pub fn has_error(&self, pred: impl Fn(&str) -> bool) -> bool {
            self.errors.lock().iter().any(|(e, _, _)| pred(e))
        }
    }

    impl FetchListener for RecordingListener {
        fn on_progress(&self, written: u64) {
            self.progress.lock().push(written);
        }

        fn on_exception(&self, error: &NpmeshError, registry: Option<&str>, address: &ContentAddress) {
            self.errors.lock().push((
                format!("{:?}", error),
                registry.map(str::to_string),
                address.to_string(),
            ));
        }
    }
}
