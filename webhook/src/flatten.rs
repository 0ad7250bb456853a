//! Projects multi-locale entries into the entities the reconcilers work on.
use crate::entry::{Entry, LocaleMap, string_form};
use indexmap::IndexMap;

/// Fields whose locale map enumerates the locales of a page, in order of preference.
pub const PAGE_LOCALE_FIELDS: &[&str] = &["pageName", "title"];

const CONTENT_FIELD: &str = "content";
const CATALOG_FIELD: &str = "catalog";
const TITLE_FIELD: &str = "title";
const SKU_FIELD: &str = "sku";

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("entry has no {0} field")]
pub struct MissingRequiredField(pub String);

/// One locale of a page entry.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalizedPage {
    pub id: String,
    pub locale: String,
    pub content: Option<String>,
    /// Every other non-null field of the locale, in field order
    pub properties: IndexMap<String, String>,
}

impl LocalizedPage {
    fn from_entry(entry: &Entry, locale: &str) -> Self {
        let mut content = None;
        let mut properties = IndexMap::new();

        for (name, locales) in &entry.fields {
            let Some(value) = locales.get(locale).filter(|v| !v.is_null()) else {
                continue;
            };
            if name == CONTENT_FIELD {
                content = Some(string_form(value));
            } else {
                properties.insert(name.clone(), string_form(value));
            }
        }

        LocalizedPage {
            id: entry.id().to_string(),
            locale: locale.to_string(),
            content,
            properties,
        }
    }
}

/// A product entry. Identity fields are reduced to one value, everything else
/// keeps its locale map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Product {
    pub id: String,
    pub catalog_name: String,
    pub sku: String,
    pub name: String,
    pub content: IndexMap<String, String>,
    pub properties: IndexMap<String, LocaleMap>,
}

/// Yields one page per locale of the first field in `locale_fields` that the
/// entry carries. The returned iterator can be cloned to walk the locales again.
pub fn flatten_page<'a>(
    entry: &'a Entry,
    locale_fields: &[&str],
) -> Result<impl Iterator<Item = LocalizedPage> + Clone + use<'a>, MissingRequiredField> {
    let locales = locale_fields
        .iter()
        .find_map(|name| entry.fields.get(*name))
        .ok_or_else(|| MissingRequiredField(locale_fields.join("|")))?;

    Ok(locales
        .keys()
        .map(move |locale| LocalizedPage::from_entry(entry, locale)))
}

fn first_value(locales: &LocaleMap) -> Option<String> {
    locales
        .values()
        .find(|v| !v.is_null())
        .map(string_form)
}

pub fn flatten_product(entry: &Entry) -> Product {
    let mut product = Product {
        id: entry.id().to_string(),
        ..Default::default()
    };

    for (name, locales) in &entry.fields {
        match name.as_str() {
            CATALOG_FIELD => product.catalog_name = first_value(locales).unwrap_or_default(),
            TITLE_FIELD => product.name = first_value(locales).unwrap_or_default(),
            SKU_FIELD => product.sku = first_value(locales).unwrap_or_default(),
            CONTENT_FIELD => {
                product.content = locales
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(locale, v)| (locale.clone(), string_form(v)))
                    .collect();
            }
            _ => {
                product.properties.insert(name.clone(), locales.clone());
            }
        }
    }

    product
}
