//! Signature card markup.
//!
//! The layout pass in `rendering::layout` reads this markup back by class name,
//! so the class and `data-*` attributes emitted here are the contract between
//! the two.

use crate::draft::SignatureDraft;
use serde::Deserialize;

pub const HOSPITAL_NAME: &str = "Ezulwini Private Hospital";
pub const WEBSITE_LABEL: &str = "www.eph-sz.com";
pub const WEBSITE_URL: &str = "https://www.eph-sz.com";
pub const ADDRESS: &str = "60/850, 60 MR103, Ezulwini, Eswatini";

/// Card stripe cells, left to right.
pub const STRIPE_COLORS: [&str; 4] = ["#00b3e3", "#f37021", "#e84c3d", "#f8f9fa"];

/// Locators of the fixed images embedded in the card.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AssetLocators {
    pub logo: String,
    pub colored_logo: String,
    pub badge: String,
}

impl Default for AssetLocators {
    fn default() -> Self {
        Self {
            logo: "/images/eph-logo.png".to_string(),
            colored_logo: "/images/colored-logo.svg".to_string(),
            badge: "/images/cohsasa-badge.png".to_string(),
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

struct Contact<'a> {
    from: &'a str,
    to: &'a str,
    label: &'a str,
    value: String,
    href: Option<&'a str>,
}

/// Render the card markup for `draft`.
pub fn render_card(draft: &SignatureDraft, assets: &AssetLocators) -> String {
    let contacts = [
        Contact {
            from: "#00b3e3",
            to: "#0099cc",
            label: "Phone:",
            value: draft.phone_display(),
            href: None,
        },
        Contact {
            from: "#f37021",
            to: "#e55a00",
            label: "Website:",
            value: WEBSITE_LABEL.to_string(),
            href: Some(WEBSITE_URL),
        },
        Contact {
            from: "#00a99d",
            to: "#008a7a",
            label: "Address:",
            value: ADDRESS.to_string(),
            href: None,
        },
    ];

    let mut html = String::new();
    html.push_str("<div class=\"sig-card\">\n");

    html.push_str("  <div class=\"sig-stripe\">");
    for color in STRIPE_COLORS {
        html.push_str(&format!("<div data-fill=\"{}\"></div>", color));
    }
    html.push_str("</div>\n");

    html.push_str("  <div class=\"sig-main\">\n");
    html.push_str("    <div class=\"sig-info\">\n");
    html.push_str(&format!("      <h2 class=\"sig-name\">{}</h2>\n", escape(draft.name())));
    html.push_str("      <div class=\"sig-rule\"></div>\n");
    html.push_str(&format!("      <p class=\"sig-title\">{}</p>\n", escape(draft.job_title())));
    html.push_str(&format!(
        "      <img class=\"sig-logo\" src=\"{}\" alt=\"EPH Logo\" height=\"48\" crossorigin=\"anonymous\">\n",
        escape(&assets.logo)
    ));
    html.push_str(&format!("      <p class=\"sig-org\">{}</p>\n", HOSPITAL_NAME));
    html.push_str("    </div>\n");

    html.push_str("    <div class=\"sig-divider\"></div>\n");

    html.push_str("    <div class=\"sig-contacts\">\n");
    for c in &contacts {
        html.push_str(&format!(
            "      <div class=\"sig-contact\" data-from=\"{}\" data-to=\"{}\"><span class=\"sig-label\">{}</span>",
            c.from, c.to, c.label
        ));
        match c.href {
            Some(href) => html.push_str(&format!(
                "<a class=\"sig-value\" href=\"{}\">{}</a>",
                href,
                escape(&c.value)
            )),
            None => html.push_str(&format!("<span class=\"sig-value\">{}</span>", escape(&c.value))),
        }
        html.push_str("</div>\n");
    }
    html.push_str("      <div class=\"sig-brands\">");
    html.push_str(&format!(
        "<img class=\"sig-brand\" src=\"{}\" alt=\"EPH Colored Logo\" width=\"110\" height=\"110\" data-opacity=\"0.9\" crossorigin=\"anonymous\">",
        escape(&assets.colored_logo)
    ));
    html.push_str(&format!(
        "<img class=\"sig-brand\" src=\"{}\" alt=\"COHSASA Accredited Badge\" width=\"40\" height=\"40\" data-opacity=\"0.9\" crossorigin=\"anonymous\">",
        escape(&assets.badge)
    ));
    html.push_str("</div>\n");
    html.push_str("    </div>\n");
    html.push_str("  </div>\n");

    html.push_str(&format!(
        "  <div class=\"sig-footer\"><span class=\"sig-footer-name\">{}</span></div>\n",
        HOSPITAL_NAME
    ));
    html.push_str("</div>\n");
    html
}

/// Plain-text rendition of the card, used by the CLI preview.
pub fn render_text_preview(draft: &SignatureDraft) -> String {
    format!(
        "{name}\n{title}\n{org}\nPhone: {phones}\nWebsite: {site}\nAddress: {addr}\n",
        name = draft.name(),
        title = draft.job_title(),
        org = HOSPITAL_NAME,
        phones = draft.phone_display(),
        site = WEBSITE_LABEL,
        addr = ADDRESS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn text_of(html: &str, sel: &str) -> String {
        let doc = Html::parse_fragment(html);
        let s = Selector::parse(sel).unwrap();
        doc.select(&s).next().map(|n| n.text().collect()).unwrap_or_default()
    }

    #[test]
    fn jane_doe_preview_omits_empty_second_phone() {
        let d = SignatureDraft::new("Jane Doe", "Radiologist", "+268 1111 1111", "");
        let preview = render_text_preview(&d);
        assert!(preview.contains("Phone: +268 1111 1111\n"));
        assert!(!preview.contains("+268 1111 1111,"));

        let html = render_card(&d, &AssetLocators::default());
        assert_eq!(text_of(&html, ".sig-name"), "Jane Doe");
        assert_eq!(text_of(&html, ".sig-title"), "Radiologist");
        assert_eq!(text_of(&html, ".sig-contact .sig-value"), "+268 1111 1111");
    }

    #[test]
    fn both_phones_empty_show_bare_label() {
        let d = SignatureDraft::new("Jane Doe", "Radiologist", "", "");
        assert!(render_text_preview(&d).contains("Phone: \n"));
        let html = render_card(&d, &AssetLocators::default());
        assert_eq!(text_of(&html, ".sig-contact .sig-value"), "");
    }

    #[test]
    fn markup_text_is_escaped() {
        let d = SignatureDraft::new("<b>A & B</b>", "\"x\"", "", "");
        let html = render_card(&d, &AssetLocators::default());
        assert!(html.contains("&lt;b&gt;A &amp; B&lt;/b&gt;"));
        assert_eq!(text_of(&html, ".sig-name"), "<b>A & B</b>");
    }

    #[test]
    fn card_embeds_the_three_images() {
        let html = render_card(&SignatureDraft::default(), &AssetLocators::default());
        let doc = Html::parse_fragment(&html);
        let s = Selector::parse("img").unwrap();
        let srcs: Vec<_> = doc.select(&s).filter_map(|n| n.value().attr("src")).collect();
        assert_eq!(
            srcs,
            vec!["/images/eph-logo.png", "/images/colored-logo.svg", "/images/cohsasa-badge.png"]
        );
    }
}
