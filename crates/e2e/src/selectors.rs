//! Console DOM selectors

pub const CREATE_CLUSTER_BUTTON: &str = "#button-create-new-cluster";
pub const NAME_FIELD: &str = "#form-input-name-field";
pub const NAME_FIELD_HELPER: &str = "#form-input-name-field-helper";
pub const PULL_SECRET_FIELD: &str = "#form-input-pullSecret-field";
pub const SSH_PUBLIC_KEY_DISCOVERY_FIELD: &str = "#form-input-sshPublicKey-discovery-field";
pub const BASE_DNS_DOMAIN_FIELD: &str = "#form-input-baseDnsDomain-field";
pub const HOST_SUBNET_FIELD: &str = "#form-input-hostSubnet-field";
pub const DOWNLOAD_ISO_BUTTON: &str = "#button-download-discovery-iso";
pub const SEARCH_STRING: &str = "#search-string";
pub const BREADCRUMB_CLUSTER: &str = ".pf-c-breadcrumb__list > :nth-child(2)";
pub const FORM: &str = "form";

pub const MODAL: &str = ".pf-c-modal-box";
pub const MODAL_HEADER: &str = ".pf-c-modal-box__header";
pub const MODAL_PRIMARY: &str = ".pf-c-modal-box__footer > .pf-m-primary";
pub const SECONDARY_BUTTON: &str = ".pf-m-secondary";
pub const ISO_MODAL_TITLE: &str = "h1#pf-modal-part-8";
pub const ISO_MODAL_CLOSE: &str = "#pf-modal-part-7 > footer > button.pf-c-button.pf-m-secondary";
pub const CLOSE_CLUSTER_BUTTON: &str = ":nth-child(4) > .pf-c-button";
pub const DELETE_CLUSTER_SUBMIT: &str = "[data-test-id=\"delete-cluster-submit\"]";
pub const DROPDOWN_MENU_ITEM: &str = ".pf-c-dropdown__menu-item";

pub const ALERT: &str = ".pf-c-alert";
pub const ALERT_DESCRIPTION: &str = ".pf-c-alert__description";
pub const CLOSE_ALERTS: &str = ".pf-l-split > :nth-child(2) > .pf-c-button";
pub const NOT_READY_BUTTON: &str = ":nth-child(5) > [data-pf-content=\"true\"] > .pf-c-button";

pub const INSTALL_BUTTON: &str = "button[name=\"install\"]";
pub const SAVE_BUTTON: &str = "button[name=\"save\"]";
pub const PROGRESS_DESCRIPTION: &str = "div.pf-c-progress__description";
pub const HOSTS_TABLE_BODIES: &str = "table.hosts-table > tbody";

pub const STATUS_FILTER_TOGGLE: &str = ".pf-c-toolbar__item .pf-c-select__toggle";
pub const CHECK_LABEL: &str = ".pf-c-check__label";
pub const CLEAR_FILTERS: &str = "#clusters-filter-toolbar > :nth-child(2) > :nth-child(2) > .pf-c-button";

/// Cluster name links on the `/clusters` page
pub const CLUSTER_NAME_LINKS: &str = "[data-label=\"Name\"] > a";

pub const PAGE_TITLE: &str = "h1";

/// Link to a cluster in the clusters list
pub fn cluster_link(cluster_name: &str) -> String {
    format!("#cluster-link-{}", cluster_name)
}

/// Cell of the clusters table; rows start at 1
pub fn cluster_table_cell(row: usize, column: &str) -> String {
    format!("tbody > tr:nth-child({}) > [data-label=\"{}\"]", row, column)
}

/// Sortable column header of the clusters table
pub fn cluster_column_header(label: &str) -> String {
    format!("th[data-label=\"{}\"] > button", label)
}

/// Kebab (actions) menu of a clusters table row
pub fn kebab(row: usize) -> String {
    format!("tbody > tr:nth-child({}) > td.pf-c-table__action > div", row)
}

pub fn delete_cluster_button(cluster_name: &str) -> String {
    format!("#button-delete-{}", cluster_name)
}

/// Detail cell of a host in the hosts table.
///
/// Each host is its own `tbody` and the header takes the first one, so the
/// first host is `row` 2. Use [`host_row`] to convert a zero-based index.
pub fn host_detail(row: usize, label: &str) -> String {
    format!("table > tbody:nth-child({}) > tr:nth-child(1) > [data-label=\"{}\"]", row, label)
}

/// Host table row for the zero-based host `index`
pub fn host_row(index: usize) -> usize {
    index + 2
}

/// Checkbox label of the status filter showing `text`
pub fn check_label(text: &str) -> String {
    format!("{}:has-text(\"{}\")", CHECK_LABEL, text)
}

/// Menu item inside an opened host role dropdown
pub fn host_role_option(row: usize, role: &str) -> String {
    format!("{} li#{}", host_detail(row, "Role"), role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_rows_are_shifted() {
        assert_eq!(host_row(0), 2);
        assert_eq!(
            host_detail(host_row(0), "Status"),
            "table > tbody:nth-child(2) > tr:nth-child(1) > [data-label=\"Status\"]"
        );
        assert_eq!(
            host_role_option(3, "worker"),
            "table > tbody:nth-child(3) > tr:nth-child(1) > [data-label=\"Role\"] li#worker"
        );
    }

    #[test]
    fn test_cluster_selectors() {
        assert_eq!(cluster_link("test-infra-cluster"), "#cluster-link-test-infra-cluster");
        assert_eq!(cluster_table_cell(1, "Hosts"), "tbody > tr:nth-child(1) > [data-label=\"Hosts\"]");
        assert_eq!(kebab(2), "tbody > tr:nth-child(2) > td.pf-c-table__action > div");
    }

    #[test]
    fn test_check_label_matches_by_text() {
        assert_eq!(check_label("Ready"), ".pf-c-check__label:has-text(\"Ready\")");
        assert_ne!(check_label("Draft"), check_label("Ready"));
    }
}
