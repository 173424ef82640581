use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::{
    browser::{ChromeSource, PageSource},
    error::CrawlerError,
    parse::{parse_company_detail, parse_job_detail, parse_listing, JobCard},
};
use crate::{
    config::CrawlerConfig,
    jobs::repo::{Company, JobPosting, NewCompany, NewJobPosting},
};

/// Persistence the crawl loop needs.
#[async_trait]
pub trait CrawlStore: Send + Sync {
    async fn find_company(&self, name: &str) -> anyhow::Result<Option<Uuid>>;
    /// Id of the company with this name, and whether this call created it.
    async fn create_company(&self, company: &NewCompany) -> anyhow::Result<(Uuid, bool)>;
    async fn posting_exists(&self, title: &str, company_id: Uuid) -> anyhow::Result<bool>;
    /// False when an identical posting already exists.
    async fn save_posting(&self, posting: &NewJobPosting) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgCrawlStore {
    db: PgPool,
}

impl PgCrawlStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CrawlStore for PgCrawlStore {
    async fn find_company(&self, name: &str) -> anyhow::Result<Option<Uuid>> {
        Ok(Company::find_by_name(&self.db, name).await?.map(|c| c.id))
    }

    async fn create_company(&self, company: &NewCompany) -> anyhow::Result<(Uuid, bool)> {
        Company::insert_or_get(&self.db, company).await
    }

    async fn posting_exists(&self, title: &str, company_id: Uuid) -> anyhow::Result<bool> {
        JobPosting::exists_for_company(&self.db, title, company_id).await
    }

    async fn save_posting(&self, posting: &NewJobPosting) -> anyhow::Result<bool> {
        JobPosting::insert(&self.db, posting).await
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub pages: u32,
    pub cards: u32,
    pub companies_created: u32,
    pub postings_saved: u32,
    pub duplicates: u32,
    pub failures: u32,
}

/// Listing URL for a 1-based result page.
pub fn page_url(search_url: &str, page: u32, page_count: u32) -> String {
    let sep = if search_url.contains('?') { '&' } else { '?' };
    format!(
        "{search_url}{sep}recruitPage={page}&recruitSort=relation&recruitPageCount={page_count}"
    )
}

fn pick_delay(min_ms: u64, max_ms: u64) -> Duration {
    let (lo, hi) = if min_ms <= max_ms {
        (min_ms, max_ms)
    } else {
        (max_ms, min_ms)
    };
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}

pub struct JobCrawler<P, S> {
    source: P,
    store: S,
    cfg: CrawlerConfig,
}

impl<P: PageSource, S: CrawlStore> JobCrawler<P, S> {
    pub fn new(source: P, store: S, cfg: CrawlerConfig) -> Self {
        Self { source, store, cfg }
    }

    async fn polite_delay(&mut self) {
        let d = pick_delay(self.cfg.min_delay_ms, self.cfg.max_delay_ms);
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }

    /// Walks the configured listing pages and stores new companies and postings.
    /// Failures of single pages or cards are counted and skipped; the browser is
    /// closed whatever happens.
    #[instrument(skip(self), fields(max_pages = self.cfg.max_pages))]
    pub async fn crawl_and_save(&mut self) -> Result<CrawlSummary, CrawlerError> {
        let result = self.crawl_pages().await;
        if let Err(e) = self.source.close().await {
            warn!("closing page source: {e}");
        }
        let summary = result?;
        info!(?summary, "crawl finished");
        Ok(summary)
    }

    async fn crawl_pages(&mut self) -> Result<CrawlSummary, CrawlerError> {
        let mut summary = CrawlSummary::default();

        for page in 1..=self.cfg.max_pages {
            let url = page_url(&self.cfg.search_url, page, self.cfg.page_count);
            let base = Url::parse(&url)?;

            let html = match self.source.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!(page, "listing page failed: {e}");
                    summary.failures += 1;
                    continue;
                }
            };
            summary.pages += 1;

            let cards = parse_listing(&html, &base);
            info!(page, cards = cards.len(), "listing page parsed");

            for card in cards {
                summary.cards += 1;
                if let Err(e) = self.process_card(&card, &mut summary).await {
                    warn!(title = %card.title, company = %card.company_name, "card failed: {e}");
                    summary.failures += 1;
                }
                self.polite_delay().await;
            }
        }
        Ok(summary)
    }

    async fn process_card(
        &mut self,
        card: &JobCard,
        summary: &mut CrawlSummary,
    ) -> Result<(), CrawlerError> {
        let company_id = match self.store.find_company(&card.company_name).await? {
            Some(id) => id,
            None => {
                let html = self.source.fetch(&card.company_url).await?;
                self.polite_delay().await;
                let detail = parse_company_detail(&html);
                let (id, created) = self
                    .store
                    .create_company(&NewCompany {
                        name: card.company_name.clone(),
                        address: detail.address,
                        industry: detail.industry,
                        ceo_name: detail.ceo_name,
                        business_content: detail.business_content,
                    })
                    .await?;
                if created {
                    summary.companies_created += 1;
                    debug!(company = %card.company_name, "company created");
                }
                id
            }
        };

        if self.store.posting_exists(&card.title, company_id).await? {
            summary.duplicates += 1;
            return Ok(());
        }

        let html = self.source.fetch(&card.detail_url).await?;
        self.polite_delay().await;
        let detail = parse_job_detail(&html);

        let saved = self
            .store
            .save_posting(&NewJobPosting {
                company_id,
                title: card.title.clone(),
                description: card.description.clone(),
                location: card.location.clone(),
                salary: detail.salary,
                experience: detail.experience,
                employment_type: detail.employment_type,
                deadline: card.deadline.clone(),
                education: detail.education,
            })
            .await?;
        if saved {
            summary.postings_saved += 1;
        } else {
            summary.duplicates += 1;
        }
        Ok(())
    }
}

/// Launches a browser and runs one full crawl against the database.
pub async fn run_once(db: &PgPool, cfg: &CrawlerConfig) -> Result<CrawlSummary, CrawlerError> {
    let source = ChromeSource::launch(cfg).await?;
    let mut crawler = JobCrawler::new(source, PgCrawlStore::new(db.clone()), cfg.clone());
    crawler.crawl_and_save().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    };

    struct FakeSource {
        pages: HashMap<String, String>,
        fetched: Arc<Mutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn fetch(&mut self, url: &str) -> Result<String, CrawlerError> {
            self.fetched.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| CrawlerError::Timeout(url.to_string()))
        }

        async fn close(&mut self) -> Result<(), CrawlerError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Memory {
        companies: Vec<(Uuid, NewCompany)>,
        postings: Vec<NewJobPosting>,
        // lookups miss, as when another writer inserts between find and create
        stale_reads: bool,
    }

    #[derive(Clone, Default)]
    struct MemoryStore(Arc<Mutex<Memory>>);

    #[async_trait]
    impl CrawlStore for MemoryStore {
        async fn find_company(&self, name: &str) -> anyhow::Result<Option<Uuid>> {
            let m = self.0.lock().unwrap();
            if m.stale_reads {
                return Ok(None);
            }
            Ok(m.companies.iter().find(|(_, c)| c.name == name).map(|(id, _)| *id))
        }

        async fn create_company(&self, company: &NewCompany) -> anyhow::Result<(Uuid, bool)> {
            let mut m = self.0.lock().unwrap();
            if let Some((id, _)) = m.companies.iter().find(|(_, c)| c.name == company.name) {
                return Ok((*id, false));
            }
            let id = Uuid::new_v4();
            m.companies.push((id, company.clone()));
            Ok((id, true))
        }

        async fn posting_exists(&self, title: &str, company_id: Uuid) -> anyhow::Result<bool> {
            let m = self.0.lock().unwrap();
            Ok(m.postings
                .iter()
                .any(|p| p.title == title && p.company_id == company_id))
        }

        async fn save_posting(&self, posting: &NewJobPosting) -> anyhow::Result<bool> {
            let mut m = self.0.lock().unwrap();
            if m.postings
                .iter()
                .any(|p| p.title == posting.title && p.company_id == posting.company_id)
            {
                return Ok(false);
            }
            m.postings.push(posting.clone());
            Ok(true)
        }
    }

    const SEARCH: &str = "https://jobs.test/search?q=rust";

    fn cfg(max_pages: u32) -> CrawlerConfig {
        CrawlerConfig {
            search_url: SEARCH.into(),
            max_pages,
            page_count: 40,
            min_delay_ms: 0,
            max_delay_ms: 0,
            ..CrawlerConfig::default()
        }
    }

    fn card(title: &str, rec: u32, corp: &str, csn: &str) -> String {
        format!(
            r#"<div class="item_recruit">
                 <h2 class="job_tit"><a href="/view?rec_idx={rec}">{title}</a></h2>
                 <div class="job_date"><span class="date">~ 12/31</span></div>
                 <div class="job_condition"><span>Seoul</span></div>
                 <div class="job_sector"><a>Rust</a><a>Axum</a></div>
                 <div class="area_corp"><strong class="corp_name"><a href="/company?csn={csn}">{corp}</a></strong></div>
               </div>"#
        )
    }

    fn fake(pages: HashMap<String, String>) -> (FakeSource, Arc<Mutex<Vec<String>>>, Arc<AtomicBool>) {
        let fetched = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        (
            FakeSource {
                pages,
                fetched: fetched.clone(),
                closed: closed.clone(),
            },
            fetched,
            closed,
        )
    }

    #[test]
    fn page_url_appends_paging_parameters() {
        assert_eq!(
            page_url(SEARCH, 2, 40),
            "https://jobs.test/search?q=rust&recruitPage=2&recruitSort=relation&recruitPageCount=40"
        );
        assert_eq!(
            page_url("https://jobs.test/search", 1, 10),
            "https://jobs.test/search?recruitPage=1&recruitSort=relation&recruitPageCount=10"
        );
    }

    #[test]
    fn delay_stays_within_bounds() {
        for _ in 0..50 {
            let d = pick_delay(1000, 3000).as_millis();
            assert!((1000..=3000).contains(&d));
        }
        assert_eq!(pick_delay(5, 5), Duration::from_millis(5));
        let d = pick_delay(300, 100).as_millis();
        assert!((100..=300).contains(&d));
    }

    #[tokio::test]
    async fn crawl_saves_new_postings_and_skips_known_ones() {
        let listing = format!(
            "<html><body>{}{}{}</body></html>",
            card("Rust Dev", 1, "Acme", "a"),
            card("Rust Dev", 2, "Acme", "a"),
            card("Platform Eng", 3, "Globex", "g"),
        );
        let mut pages = HashMap::new();
        pages.insert(page_url(SEARCH, 1, 40), listing);
        pages.insert(
            "https://jobs.test/company?csn=a".into(),
            r#"<div class="company_details_group"><dt class="tit">업종</dt><dd class="desc">Software</dd></div>"#.into(),
        );
        pages.insert(
            "https://jobs.test/company?csn=g".into(),
            "<html></html>".into(),
        );
        pages.insert(
            "https://jobs.test/view?rec_idx=1".into(),
            "<dl><dt>급여</dt><dd>면접 후 결정</dd></dl>".into(),
        );
        pages.insert("https://jobs.test/view?rec_idx=3".into(), "<html></html>".into());

        let (source, fetched, closed) = fake(pages);
        let store = MemoryStore::default();
        let mut crawler = JobCrawler::new(source, store.clone(), cfg(1));

        let summary = crawler.crawl_and_save().await.unwrap();
        assert_eq!(
            summary,
            CrawlSummary {
                pages: 1,
                cards: 3,
                companies_created: 2,
                postings_saved: 2,
                duplicates: 1,
                failures: 0,
            }
        );
        assert!(closed.load(Ordering::SeqCst));

        let mem = store.0.lock().unwrap();
        let acme = &mem.companies[0].1;
        assert_eq!(acme.name, "Acme");
        assert_eq!(acme.industry, "Software");
        let first = &mem.postings[0];
        assert_eq!(first.title, "Rust Dev");
        assert_eq!(first.description, "Rust, Axum");
        assert_eq!(first.salary, "면접 후 결정");
        assert_eq!(first.location, "Seoul");
        assert_eq!(first.deadline, "~ 12/31");

        // the duplicate card never triggers a detail fetch
        let fetched = fetched.lock().unwrap();
        assert!(!fetched.iter().any(|u| u.ends_with("rec_idx=2")));
        assert_eq!(
            fetched.iter().filter(|u| u.contains("csn=a")).count(),
            1,
            "known company is not fetched again"
        );
    }

    #[tokio::test]
    async fn failures_are_counted_and_do_not_abort() {
        let listing = format!(
            "<html><body>{}{}</body></html>",
            card("Broken", 1, "Nowhere", "x"),
            card("Fine", 2, "Acme", "a"),
        );
        let mut pages = HashMap::new();
        // page 1 missing entirely, page 2 present
        pages.insert(page_url(SEARCH, 2, 40), listing);
        pages.insert("https://jobs.test/company?csn=a".into(), "<html></html>".into());
        pages.insert("https://jobs.test/view?rec_idx=2".into(), "<html></html>".into());

        let (source, _fetched, closed) = fake(pages);
        let store = MemoryStore::default();
        let mut crawler = JobCrawler::new(source, store.clone(), cfg(2));

        let summary = crawler.crawl_and_save().await.unwrap();
        assert_eq!(summary.pages, 1);
        assert_eq!(summary.cards, 2);
        assert_eq!(summary.failures, 2);
        assert_eq!(summary.postings_saved, 1);
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(store.0.lock().unwrap().postings[0].title, "Fine");
    }

    #[tokio::test]
    async fn invalid_search_url_still_closes_the_source() {
        let (source, _fetched, closed) = fake(HashMap::new());
        let mut crawler = JobCrawler::new(
            source,
            MemoryStore::default(),
            CrawlerConfig {
                search_url: "not a url".into(),
                ..cfg(1)
            },
        );
        let err = crawler.crawl_and_save().await.unwrap_err();
        assert!(matches!(err, CrawlerError::Url(_)));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn company_created_elsewhere_is_not_counted() {
        let listing = format!(
            "<html><body>{}{}</body></html>",
            card("Rust Dev", 1, "Acme", "a"),
            card("Go Dev", 2, "Acme", "a"),
        );
        let mut pages = HashMap::new();
        pages.insert(page_url(SEARCH, 1, 40), listing);
        pages.insert("https://jobs.test/company?csn=a".into(), "<html></html>".into());
        pages.insert("https://jobs.test/view?rec_idx=1".into(), "<html></html>".into());
        pages.insert("https://jobs.test/view?rec_idx=2".into(), "<html></html>".into());

        let (source, _fetched, _closed) = fake(pages);
        let store = MemoryStore::default();
        store.0.lock().unwrap().stale_reads = true;
        let mut crawler = JobCrawler::new(source, store.clone(), cfg(1));

        let summary = crawler.crawl_and_save().await.unwrap();
        assert_eq!(summary.companies_created, 1);
        assert_eq!(summary.postings_saved, 2);
        assert_eq!(store.0.lock().unwrap().companies.len(), 1);
    }
}
