//! Test doubles for the network and storage seams.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use pwa_cache_core::{CacheDb, CacheStorage, Error, Network, Request, Response};

/// Network double answering from a URL → response table.
///
/// Unknown URLs fail like an unreachable host.
pub struct MockNetwork {
    routes: Mutex<HashMap<String, Result<Response, String>>>,
    calls: AtomicUsize,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self { routes: Mutex::new(HashMap::new()), calls: AtomicUsize::new(0) }
    }

    pub fn respond_with(&self, url: &str, response: Response) {
        self.routes.lock().unwrap().insert(url.to_string(), Ok(response));
    }

    pub fn fail_with(&self, url: &str, message: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let routes = self.routes.lock().unwrap();
        match routes.get(request.url().as_str()) {
            Some(Ok(response)) => response.try_clone(),
            Some(Err(message)) => Err(Error::Network(message.clone())),
            None => Err(Error::Network(format!("no route to {}", request.url()))),
        }
    }
}

/// `CacheDb` wrapper that counts calls and injects failures.
pub struct CountingStorage {
    inner: CacheDb,
    reads: AtomicUsize,
    puts: AtomicUsize,
    fail_matches: AtomicBool,
    fail_puts: AtomicBool,
    fail_keys: AtomicBool,
    undeletable: Mutex<HashSet<String>>,
}

impl CountingStorage {
    pub fn new(inner: CacheDb) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            fail_matches: AtomicBool::new(false),
            fail_puts: AtomicBool::new(false),
            fail_keys: AtomicBool::new(false),
            undeletable: Mutex::new(HashSet::new()),
        }
    }

    pub fn inner(&self) -> &CacheDb {
        &self.inner
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn fail_matches(&self, fail: bool) {
        self.fail_matches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_keys(&self, fail: bool) {
        self.fail_keys.store(fail, Ordering::SeqCst);
    }

    pub fn refuse_delete(&self, name: &str) {
        self.undeletable.lock().unwrap().insert(name.to_string());
    }
}

#[async_trait]
impl CacheStorage for CountingStorage {
    async fn keys(&self) -> Result<Vec<String>, Error> {
        if self.fail_keys.load(Ordering::SeqCst) {
            return Err(Error::Host("cache storage unavailable".into()));
        }
        self.inner.keys().await
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        self.inner.has(name).await
    }

    async fn open_store(&self, name: &str) -> Result<(), Error> {
        self.inner.open_store(name).await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        if self.undeletable.lock().unwrap().contains(name) {
            return Err(Error::Host(format!("store {name} is locked")));
        }
        self.inner.delete(name).await
    }

    async fn match_request(&self, name: &str, request: &Request) -> Result<Option<Response>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_matches.load(Ordering::SeqCst) {
            return Err(Error::Host("cache read failed".into()));
        }
        self.inner.match_request(name, request).await
    }

    async fn put(&self, name: &str, request: &Request, response: Response) -> Result<(), Error> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::Host("disk full".into()));
        }
        self.inner.put(name, request, response).await
    }
}
