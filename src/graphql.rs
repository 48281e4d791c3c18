use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::{AuthorRole, CheckState, Comment, Mergeable, PullRequest};

/// Pull requests fetched per page.
pub const PAGE_SIZE: u32 = 100;

/// Most recent comments fetched per pull request.
pub const COMMENTS_PER_PULL: u32 = 50;

/// Login GitHub shows for deleted accounts.
const GHOST_LOGIN: &str = "ghost";

pub fn create_graphql_query(owner: &str, name: &str, after: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "query": format!(r#"
            query($owner: String!, $name: String!, $after: String) {{
                repository(owner: $owner, name: $name) {{
                    owner {{
                        login
                    }}
                    pullRequests(states: OPEN, first: {PAGE_SIZE}, after: $after, orderBy: {{field: CREATED_AT, direction: DESC}}) {{
                        nodes {{
                            number
                            title
                            url
                            createdAt
                            updatedAt
                            mergeable
                            author {{
                                login
                            }}
                            commits(last: 1) {{
                                totalCount
                                nodes {{
                                    commit {{
                                        committedDate
                                        statusCheckRollup {{
                                            state
                                        }}
                                    }}
                                }}
                            }}
                            comments(last: {COMMENTS_PER_PULL}) {{
                                totalCount
                                nodes {{
                                    author {{
                                        login
                                    }}
                                    authorAssociation
                                    body
                                    createdAt
                                }}
                            }}
                        }}
                        pageInfo {{
                            hasNextPage
                            endCursor
                        }}
                    }}
                }}
            }}
        "#),
        "variables": {
            "owner": owner,
            "name": name,
            "after": after,
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse {
    pub data: Option<RepositoryData>,
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryData {
    pub repository: Option<GraphQLRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRepository {
    pub owner: GraphQLActor,
    pub pull_requests: PullRequestConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestConnection {
    pub nodes: Vec<GraphQLPullRequest>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLActor {
    pub login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLPullRequest {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub mergeable: Mergeable,
    pub author: Option<GraphQLActor>,
    pub commits: CommitConnection,
    pub comments: CommentConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitConnection {
    pub total_count: u64,
    pub nodes: Vec<CommitNode>,
}

#[derive(Debug, Deserialize)]
pub struct CommitNode {
    pub commit: GraphQLCommit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLCommit {
    pub committed_date: Option<DateTime<Utc>>,
    pub status_check_rollup: Option<StatusCheckRollup>,
}

#[derive(Debug, Deserialize)]
pub struct StatusCheckRollup {
    pub state: CheckState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentConnection {
    pub total_count: u64,
    pub nodes: Vec<GraphQLComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLComment {
    pub author: Option<GraphQLActor>,
    #[serde(default)]
    pub author_association: AuthorRole,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

fn login_or_ghost(actor: Option<GraphQLActor>) -> String {
    actor
        .map(|actor| actor.login)
        .unwrap_or_else(|| GHOST_LOGIN.to_string())
}

pub fn convert_comment(comment: GraphQLComment) -> Comment {
    Comment {
        author: login_or_ghost(comment.author),
        role: comment.author_association,
        body: comment.body,
        created_at: comment.created_at,
    }
}

/// Converts a GraphQL pull request node into the domain representation.
pub fn convert_pull_request(node: GraphQLPullRequest) -> PullRequest {
    let head = node
        .commits
        .nodes
        .into_iter()
        .next()
        .map(|node| node.commit);

    PullRequest {
        number: node.number,
        title: node.title,
        url: node.url,
        author: login_or_ghost(node.author),
        created_at: node.created_at,
        updated_at: node.updated_at,
        mergeable: node.mergeable,
        status: head
            .as_ref()
            .and_then(|commit| commit.status_check_rollup.as_ref())
            .map(|rollup| rollup.state),
        commit_count: node.commits.total_count,
        head_committed_at: head.and_then(|commit| commit.committed_date),
        comment_count: node.comments.total_count,
        comments: node
            .comments
            .nodes
            .into_iter()
            .map(convert_comment)
            .collect(),
    }
}
