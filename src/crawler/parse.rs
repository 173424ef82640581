//! Pure HTML extraction for the listing, posting and company pages.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use url::Url;

lazy_static! {
    static ref CARD: Selector = Selector::parse("div.item_recruit").unwrap();
    static ref CARD_TITLE: Selector = Selector::parse("h2.job_tit a").unwrap();
    static ref CARD_SECTOR: Selector = Selector::parse("div.job_sector a").unwrap();
    static ref CARD_DATE: Selector = Selector::parse("div.job_date span.date").unwrap();
    static ref CARD_CORP: Selector = Selector::parse("div.area_corp strong.corp_name a").unwrap();
    static ref CARD_CONDITION: Selector = Selector::parse("div.job_condition span").unwrap();
    static ref DT: Selector = Selector::parse("dt").unwrap();
    static ref COMPANY_GROUP: Selector = Selector::parse("div.company_details_group").unwrap();
    static ref COMPANY_TIT: Selector = Selector::parse("dt.tit").unwrap();
    static ref COMPANY_DESC: Selector = Selector::parse("dd.desc").unwrap();
    static ref COMPANY_ADDR: Selector = Selector::parse("dd.desc p").unwrap();
}

/// One result card on a search listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCard {
    pub title: String,
    pub detail_url: String,
    pub description: String,
    pub deadline: String,
    pub company_name: String,
    pub company_url: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDetail {
    pub employment_type: String,
    pub salary: String,
    pub education: String,
    pub experience: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyDetail {
    pub industry: String,
    pub ceo_name: String,
    pub business_content: String,
    pub address: String,
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(root: ElementRef<'_>, selector: &Selector) -> String {
    root.select(selector).next().map(text_of).unwrap_or_default()
}

fn absolute(base: &Url, href: &str) -> Option<String> {
    base.join(href).ok().map(String::from)
}

/// Cards without a title link or a company link are dropped.
pub fn parse_listing(html: &str, page_url: &Url) -> Vec<JobCard> {
    let doc = Html::parse_document(html);

    let mut cards = Vec::new();
    for card in doc.select(&CARD) {
        let Some(title_el) = card.select(&CARD_TITLE).next() else {
            continue;
        };
        let Some(corp_el) = card.select(&CARD_CORP).next() else {
            continue;
        };
        let mut title = text_of(title_el);
        if title.is_empty() {
            title = title_el
                .value()
                .attr("title")
                .map(str::trim)
                .unwrap_or_default()
                .to_string();
        }
        let company_name = text_of(corp_el);
        if title.is_empty() || company_name.is_empty() {
            continue;
        }
        let (Some(detail_url), Some(company_url)) = (
            title_el.value().attr("href").and_then(|h| absolute(page_url, h)),
            corp_el.value().attr("href").and_then(|h| absolute(page_url, h)),
        ) else {
            continue;
        };

        let description = card
            .select(&CARD_SECTOR)
            .map(text_of)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        cards.push(JobCard {
            title,
            detail_url,
            description,
            deadline: first_text(card, &CARD_DATE),
            company_name,
            company_url,
            location: first_text(card, &CARD_CONDITION),
        });
    }
    cards
}

/// Value of the `dd` following the first `dt` whose text contains `label`.
fn labeled_value(doc: &Html, label: &str) -> String {
    for dt in doc.select(&DT) {
        if !text_of(dt).contains(label) {
            continue;
        }
        let dd = dt
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "dd");
        if let Some(dd) = dd {
            return text_of(dd);
        }
    }
    String::new()
}

pub fn parse_job_detail(html: &str) -> JobDetail {
    let doc = Html::parse_document(html);
    JobDetail {
        employment_type: labeled_value(&doc, "근무형태"),
        salary: labeled_value(&doc, "급여"),
        education: labeled_value(&doc, "학력"),
        experience: labeled_value(&doc, "경력"),
    }
}

pub fn parse_company_detail(html: &str) -> CompanyDetail {
    let doc = Html::parse_document(html);

    let mut out = CompanyDetail::default();
    for group in doc.select(&COMPANY_GROUP) {
        let label = first_text(group, &COMPANY_TIT);
        if label.contains("업종") {
            out.industry = first_text(group, &COMPANY_DESC);
        } else if label.contains("대표자명") {
            out.ceo_name = first_text(group, &COMPANY_DESC);
        } else if label.contains("사업내용") {
            out.business_content = first_text(group, &COMPANY_DESC);
        } else if label.contains("주소") {
            out.address = first_text(group, &COMPANY_ADDR);
        }
    }
    out
}
