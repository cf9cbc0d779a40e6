//! Built-in test suites
//!
//! Cases that need more than a flat list of steps (loops over hosts,
//! sorting cycles, multi-stage installs) are written in Rust against
//! [`Console`] rather than in YAML.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::info;

use crate::error::E2eResult;
use crate::flows::Console;
use crate::page::Probe;
use crate::poll::Expectation;
use crate::selectors::*;

/// Async body of a case
pub type CaseFn = for<'a> fn(&'a Console<'a>) -> BoxFuture<'a, E2eResult<()>>;

/// Name given to the throwaway cluster created by the list tests
pub const DUMMY_CLUSTER_NAME: &str = "test-dummy-cluster";

/// Version the console preselects for new clusters
pub const DUMMY_CLUSTER_VERSION: &str = "4.6";

const CLUSTER_COLUMNS: [&str; 5] = ["Name", "Base domain", "Version", "Status", "Hosts"];

pub struct Case {
    pub name: &'static str,
    pub run: CaseFn,
}

pub struct Suite {
    pub name: &'static str,
    /// Runs before every case, in the same browsing session
    pub before_each: Option<CaseFn>,
    pub cases: Vec<Case>,
}

impl Suite {
    pub fn case(&self, name: &str) -> Option<&Case> {
        self.cases.iter().find(|c| c.name == name)
    }
}

/// Every built-in suite
pub fn all() -> Vec<Suite> {
    vec![managed_clusters(), cluster_installation()]
}

pub fn by_name(name: &str) -> Option<Suite> {
    all().into_iter().find(|s| s.name == name)
}

/// The clusters list: rendering, columns, create/delete, sorting, filters
pub fn managed_clusters() -> Suite {
    Suite {
        name: "managed-clusters",
        before_each: Some(open_clusters_list),
        cases: vec![
            Case { name: "can render", run: can_render },
            Case { name: "has columns", run: has_columns },
            Case { name: "can create and delete a dummy cluster", run: create_and_delete_dummy_cluster },
            Case { name: "can filter clusters", run: filter_clusters },
        ],
    }
}

/// Discovery through installation of the configured cluster
pub fn cluster_installation() -> Suite {
    Suite {
        name: "cluster-installation",
        before_each: None,
        cases: vec![Case { name: "installs the cluster", run: install_cluster }],
    }
}

fn open_clusters_list<'a>(console: &'a Console<'a>) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        console.assert_test_cluster_presence().await?;
        console.page().visit("/clusters").await
    }
    .boxed()
}

fn can_render<'a>(console: &'a Console<'a>) -> BoxFuture<'a, E2eResult<()>> {
    async move { console.expect_text(PAGE_TITLE, "Assisted Bare Metal Clusters").await }.boxed()
}

fn has_columns<'a>(console: &'a Console<'a>) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        for column in CLUSTER_COLUMNS {
            console.expect_text(&cluster_column_header(column), column).await?;
        }
        Ok(())
    }
    .boxed()
}

async fn expect_row_names(console: &Console<'_>, first: &str, second: &str) -> E2eResult<()> {
    console.expect_text(&cluster_table_cell(1, "Name"), first).await?;
    console.expect_text(&cluster_table_cell(2, "Name"), second).await
}

fn create_and_delete_dummy_cluster<'a>(console: &'a Console<'a>) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let page = console.page();
        let infra = console.config().test_infra_cluster.name.as_str();

        // Only "Delete" is offered for the lone cluster.
        page.click(&kebab(1)).await?;
        console.expect_count(DROPDOWN_MENU_ITEM, 1).await?;

        console.create_dummy_cluster(DUMMY_CLUSTER_NAME).await?;
        console.cancel_dummy_cluster().await?;
        console.assert_duplicate_name_rejected(infra).await?;

        console.create_cluster(DUMMY_CLUSTER_NAME).await?;
        console.close_cluster_details().await?;

        console.expect_count(CLUSTER_NAME_LINKS, 2).await?;
        expect_row_names(console, DUMMY_CLUSTER_NAME, infra).await?;
        console.expect_text(&cluster_table_cell(1, "Base domain"), "-").await?;
        console.expect_text(&cluster_table_cell(1, "Version"), DUMMY_CLUSTER_VERSION).await?;
        console.expect_text(&cluster_table_cell(1, "Status"), "Draft").await?;
        console.expect_text(&cluster_table_cell(1, "Hosts"), "0").await?;

        info!("Checking clusters sorting");
        page.click(&cluster_column_header("Name")).await?;
        expect_row_names(console, infra, DUMMY_CLUSTER_NAME).await?;
        page.click(&cluster_column_header("Name")).await?;
        expect_row_names(console, DUMMY_CLUSTER_NAME, infra).await?;

        for column in &CLUSTER_COLUMNS[1..] {
            page.click(&cluster_column_header(column)).await?;
            page.click(&cluster_column_header(column)).await?;
        }
        page.click(&cluster_column_header("Name")).await?;
        console.expect_count(CLUSTER_NAME_LINKS, 2).await?;

        let row = match console.page().read(&cluster_table_cell(1, "Name"), Probe::Text).await? {
            observed if Expectation::contains(DUMMY_CLUSTER_NAME).is_met(&observed) => 1,
            _ => 2,
        };
        console.delete_dummy_cluster(row, DUMMY_CLUSTER_NAME).await?;
        console.assert_test_cluster_presence().await
    }
    .boxed()
}

/// Clusters created next to the test cluster by the filter case
pub const FILTER_CLUSTER_NAMES: [&str; 2] = ["cluster-aa-0", "cluster-bb-0"];

/// Wait until exactly the clusters in `shown` are listed among `all`
async fn expect_listed(console: &Console<'_>, all: &[&str], shown: &[&str]) -> E2eResult<()> {
    for name in all {
        if shown.contains(name) {
            console.expect_present(&cluster_link(name)).await?;
        } else {
            console.expect_absent(&cluster_link(name)).await?;
        }
    }
    Ok(())
}

fn filter_clusters<'a>(console: &'a Console<'a>) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let page = console.page();
        let infra = console.config().test_infra_cluster.name.as_str();
        let [aa, bb] = FILTER_CLUSTER_NAMES;
        let all = [infra, aa, bb];

        for name in FILTER_CLUSTER_NAMES {
            console.create_cluster(name).await?;
            console.close_cluster_details().await?;
        }
        expect_listed(console, &all, &all).await?;

        info!("Filtering clusters by name");
        console.retype(SEARCH_STRING, "NONSENS").await?;
        expect_listed(console, &all, &[]).await?;
        page.clear(SEARCH_STRING).await?;
        expect_listed(console, &all, &all).await?;

        console.retype(SEARCH_STRING, "aa").await?;
        expect_listed(console, &all, &[aa]).await?;
        page.clear(SEARCH_STRING).await?;
        console.expect_present(&cluster_link(infra)).await?;

        info!("Filtering clusters by status");
        page.click(STATUS_FILTER_TOGGLE).await?;
        page.click(&check_label("Draft")).await?;
        expect_listed(console, &all, &[aa, bb]).await?;
        page.click(&check_label("Ready")).await?;
        expect_listed(console, &all, &all).await?;
        page.click(&check_label("Draft")).await?;
        expect_listed(console, &all, &[infra]).await?;

        page.click(CLEAR_FILTERS).await?;
        expect_listed(console, &all, &all).await?;

        for name in FILTER_CLUSTER_NAMES {
            console.delete_dummy_cluster(1, name).await?;
        }
        console.assert_test_cluster_presence().await
    }
    .boxed()
}

fn install_cluster<'a>(console: &'a Console<'a>) -> BoxFuture<'a, E2eResult<()>> {
    async move {
        let config = console.config();
        let cluster_name = config.cluster_name.as_str();

        console.open_cluster(cluster_name).await?;
        console.verify_cluster_creation_api(cluster_name).await?;

        console.generate_iso().await?;
        console.wait_for_host_table_population().await?;
        console.wait_for_pending_input_state().await?;

        console.set_hosts_role().await?;
        console.set_cluster_dns_domain(Some(&config.dns_domain_name)).await?;
        console.wait_for_hosts_subnet().await?;
        console.set_cluster_subnet_cidr().await?;
        console.save_cluster_details().await?;
        console.wait_for_hosts_to_be_known().await?;

        console.start_cluster_installation().await?;
        console.wait_for_cluster_installation().await
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suites_by_name() {
        let suite = by_name("managed-clusters").unwrap();
        assert!(suite.before_each.is_some());
        assert_eq!(suite.cases.len(), 4);
        assert!(suite.case("has columns").is_some());

        assert!(by_name("cluster-installation").unwrap().before_each.is_none());
        assert!(by_name("nope").is_none());
    }
}
