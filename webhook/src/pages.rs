//! Page artifacts: Markdown files with a YAML front-matter block, one per page
//! (and per locale with the localized layout) under the store directory.
use crate::classify::Operation;
use crate::errors::Result;
use crate::flatten::LocalizedPage;
use crate::key_lock::KeyedLocks;
use crate::metrics_defs::{PAGES_PUBLISHED, PAGES_UNPUBLISHED};
use crate::render::RichTextRenderer;
use serde::Deserialize;
use shared::counter;
use std::sync::Arc;
use stores::blob::BlobStore;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageLayout {
    /// `{store}/{page}.md`. Locales of one page share the artifact and the last
    /// one written wins.
    Flat,
    /// `{store}/{locale}/{page}.md`
    #[default]
    Localized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageAction {
    Published,
    Unpublished,
    Skipped,
}

pub struct PageReconciler {
    blobs: Arc<dyn BlobStore>,
    renderer: Arc<dyn RichTextRenderer>,
    layout: PageLayout,
    locks: KeyedLocks,
}

impl PageReconciler {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        renderer: Arc<dyn RichTextRenderer>,
        layout: PageLayout,
    ) -> Self {
        PageReconciler {
            blobs,
            renderer,
            layout,
            locks: KeyedLocks::new(),
        }
    }

    /// `(base_path, filename)` of the artifact for `page` in `store_id`.
    pub fn artifact_location(&self, store_id: &str, page: &LocalizedPage) -> (String, String) {
        let base_path = match self.layout {
            PageLayout::Flat => store_id.to_string(),
            PageLayout::Localized => format!("{store_id}/{}", page.locale),
        };
        (base_path, format!("{}.md", page.id))
    }

    /// Front-matter from the page properties, followed by the rendered content.
    pub fn render_artifact(&self, page: &LocalizedPage) -> Result<String> {
        let front_matter = serde_yaml::to_string(&page.properties)?;
        let body = page
            .content
            .as_deref()
            .map(|content| self.renderer.render(content))
            .unwrap_or_default();

        Ok(format!(
            "---\n{}\n---\n{body}",
            front_matter.trim_end_matches('\n')
        ))
    }

    pub async fn publish(&self, store_id: &str, page: &LocalizedPage) -> Result<()> {
        let (base_path, filename) = self.artifact_location(store_id, page);
        let contents = self.render_artifact(page)?;

        let _guard = self.locks.lock(&format!("{base_path}/{filename}")).await;
        self.blobs
            .write(&base_path, &filename, contents.as_bytes())
            .await?;

        counter!(PAGES_PUBLISHED).increment(1);
        tracing::info!(store_id, page_id = %page.id, locale = %page.locale, "page published");
        Ok(())
    }

    /// Removes the artifact. Removing a page that was never published succeeds.
    pub async fn unpublish(&self, store_id: &str, page: &LocalizedPage) -> Result<()> {
        let (base_path, filename) = self.artifact_location(store_id, page);

        let _guard = self.locks.lock(&format!("{base_path}/{filename}")).await;
        self.blobs.remove(&base_path, &filename).await?;

        counter!(PAGES_UNPUBLISHED).increment(1);
        tracing::info!(store_id, page_id = %page.id, locale = %page.locale, "page unpublished");
        Ok(())
    }

    pub async fn apply(
        &self,
        store_id: &str,
        operation: Operation,
        page: &LocalizedPage,
    ) -> Result<PageAction> {
        match operation {
            Operation::Publish => {
                self.publish(store_id, page).await?;
                Ok(PageAction::Published)
            }
            Operation::Unpublish | Operation::Delete | Operation::Archive => {
                self.unpublish(store_id, page).await?;
                Ok(PageAction::Unpublished)
            }
            Operation::Unknown => {
                tracing::debug!(page_id = %page.id, "unknown topic, page left untouched");
                Ok(PageAction::Skipped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HtmlRenderer;
    use indexmap::IndexMap;
    use stores::blob::{FilesystemBlobStore, InMemoryBlobStore};

    fn page(locale: &str, title: &str, content: Option<&str>) -> LocalizedPage {
        LocalizedPage {
            id: "home-1".into(),
            locale: locale.into(),
            content: content.map(String::from),
            properties: IndexMap::from([
                ("title".to_string(), title.to_string()),
                ("permalink".to_string(), "/home".to_string()),
            ]),
        }
    }

    fn reconciler(blobs: Arc<dyn BlobStore>, layout: PageLayout) -> PageReconciler {
        PageReconciler::new(blobs, Arc::new(HtmlRenderer), layout)
    }

    #[test]
    fn test_render_artifact() {
        let reconciler = reconciler(Arc::new(InMemoryBlobStore::new()), PageLayout::Flat);

        let artifact = reconciler
            .render_artifact(&page("en-US", "Home", Some("<p>Hi</p>")))
            .unwrap();
        assert_eq!(artifact, "---\ntitle: Home\npermalink: /home\n---\n<p>Hi</p>");

        let rich = r#"{"nodeType":"document","content":[{"nodeType":"paragraph","content":[{"nodeType":"text","value":"Hi","marks":[]}]}]}"#;
        let artifact = reconciler
            .render_artifact(&page("en-US", "Home", Some(rich)))
            .unwrap();
        assert!(artifact.ends_with("---\n<p>Hi</p>"));

        let artifact = reconciler
            .render_artifact(&page("en-US", "Home", None))
            .unwrap();
        assert!(artifact.ends_with("---\n"));
    }

    #[test]
    fn test_artifact_location() {
        let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        let flat = reconciler(blobs.clone(), PageLayout::Flat);
        let localized = reconciler(blobs, PageLayout::Localized);
        let page = page("de-DE", "Startseite", None);

        assert_eq!(
            flat.artifact_location("electronics", &page),
            ("electronics".to_string(), "home-1.md".to_string())
        );
        assert_eq!(
            localized.artifact_location("electronics", &page),
            ("electronics/de-DE".to_string(), "home-1.md".to_string())
        );
    }

    #[tokio::test]
    async fn test_publish_and_unpublish() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = reconciler(
            Arc::new(FilesystemBlobStore::new(dir.path())),
            PageLayout::Localized,
        );
        let path = dir.path().join("electronics/en-US/home-1.md");

        let en = page("en-US", "Home", Some("<p>Hi</p>"));
        assert_eq!(
            reconciler.apply("electronics", Operation::Publish, &en).await.unwrap(),
            PageAction::Published
        );
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("title: Home"));
        assert!(written.ends_with("<p>Hi</p>"));

        // Republishing overwrites
        let en = page("en-US", "Welcome", Some("<p>Hey</p>"));
        reconciler.publish("electronics", &en).await.unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("title: Welcome"));

        for op in [Operation::Unpublish, Operation::Delete, Operation::Archive] {
            assert_eq!(
                reconciler.apply("electronics", op, &en).await.unwrap(),
                PageAction::Unpublished
            );
            assert!(!path.exists());
        }
    }

    #[tokio::test]
    async fn test_unknown_operation_is_skipped() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let reconciler = reconciler(blobs.clone(), PageLayout::Flat);
        let en = page("en-US", "Home", None);

        reconciler.publish("electronics", &en).await.unwrap();
        assert_eq!(
            reconciler
                .apply("electronics", Operation::Unknown, &en)
                .await
                .unwrap(),
            PageAction::Skipped
        );
        assert_eq!(blobs.keys(), vec!["electronics/home-1.md".to_string()]);
    }

    #[tokio::test]
    async fn test_flat_layout_last_locale_wins() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let reconciler = reconciler(blobs.clone(), PageLayout::Flat);

        reconciler
            .publish("electronics", &page("en-US", "Home", None))
            .await
            .unwrap();
        reconciler
            .publish("electronics", &page("de-DE", "Startseite", None))
            .await
            .unwrap();

        assert_eq!(blobs.keys(), vec!["electronics/home-1.md".to_string()]);
        let stored = blobs.read("electronics", "home-1.md").await.unwrap().unwrap();
        assert!(String::from_utf8(stored).unwrap().contains("title: Startseite"));
    }
}
