use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::{
    auth::repo_types::User,
    collection::{next_after, nth_after, present, today, RawId},
    commands::{
        dto::{AddCommandRequest, ImportItem},
        repo_types::{Command, CommandPatch},
    },
    error::{AppError, AppResult, StoreError},
    store::{Collection, UserStore},
};

/// Max-of-tail: derived from the last element only.
pub fn next_command_id(commands: &[Command]) -> Result<i64, StoreError> {
    next_after(commands.last().map(|c| c.id))
}

fn build(id: i64, item: AddCommandRequest) -> AppResult<Command> {
    let command = present(item.command)
        .ok_or_else(|| AppError::validation("Command text is required"))?;
    Ok(Command {
        id,
        command,
        description: item.description.unwrap_or_default(),
        last_used: present(item.last_used).unwrap_or_else(today),
    })
}

fn command_id(raw: Option<&RawId>, action: &str) -> AppResult<i64> {
    match raw.and_then(RawId::as_int) {
        Some(id) if id != 0 => Ok(id),
        _ => Err(AppError::validation(format!(
            "Command ID is required for {action}"
        ))),
    }
}

fn to_elems(commands: &[Command]) -> AppResult<Vec<Value>> {
    commands
        .iter()
        .map(|c| {
            serde_json::to_value(c)
                .map_err(|e| AppError::server("Server error while encoding commands", e))
        })
        .collect()
}

pub async fn add_command(
    store: &dyn UserStore,
    user: &User,
    req: AddCommandRequest,
) -> AppResult<Command> {
    let id = next_command_id(&user.commands)
        .map_err(|e| AppError::server("Server error during command addition", e))?;
    let command = build(id, req)?;

    let modified = store
        .push(user.id, Collection::Commands, to_elems(std::slice::from_ref(&command))?)
        .await
        .map_err(|e| AppError::server("Server error during command addition", e))?;
    if modified == 0 {
        return Err(AppError::server(
            "Server error during command addition",
            anyhow::anyhow!("user {} vanished before push", user.id),
        ));
    }

    info!(user_id = %user.id, command_id = command.id, "command added");
    Ok(command)
}

/// Validates the whole batch before writing; ids continue from the tail in
/// input order and the batch is appended in one operation.
pub async fn import_commands(
    store: &dyn UserStore,
    user: &User,
    items: Option<Vec<ImportItem>>,
) -> AppResult<Vec<Command>> {
    let items = items
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation("An array of commands is required"))?;

    let tail = user.commands.last().map(|c| c.id);
    let imported = items
        .into_iter()
        .enumerate()
        .map(|(n, item)| {
            let id = nth_after(tail, n)
                .map_err(|e| AppError::server("Server error during command import", e))?;
            build(id, item)
        })
        .collect::<AppResult<Vec<_>>>()?;
    let start = imported[0].id;

    let modified = store
        .push(user.id, Collection::Commands, to_elems(&imported)?)
        .await
        .map_err(|e| AppError::server("Server error during command import", e))?;
    if modified == 0 {
        return Err(AppError::server(
            "Server error during command import",
            anyhow::anyhow!("user {} vanished before push", user.id),
        ));
    }

    info!(user_id = %user.id, count = imported.len(), first_id = start, "commands imported");
    Ok(imported)
}

/// Returns the id that was updated.
pub async fn update_command(
    store: &dyn UserStore,
    user: &User,
    id: Option<&RawId>,
    patch: CommandPatch,
) -> AppResult<i64> {
    let id = command_id(id, "update")?;
    let patch = CommandPatch {
        command: present(patch.command),
        description: patch.description,
        last_used: present(patch.last_used),
    };
    if patch.is_empty() {
        return Err(AppError::validation("No fields provided for update"));
    }

    let fields = match serde_json::to_value(&patch) {
        Ok(Value::Object(m)) => m,
        Ok(_) => Map::new(),
        Err(e) => return Err(AppError::server("Server error during command update", e)),
    };
    let modified = store
        .set_fields(user.id, Collection::Commands, json!(id), fields)
        .await
        .map_err(|e| AppError::server("Server error during command update", e))?;
    if modified == 0 {
        warn!(user_id = %user.id, command_id = id, "command update matched nothing");
        return Err(AppError::not_found("Command not found or no change applied"));
    }

    info!(user_id = %user.id, command_id = id, "command updated");
    Ok(id)
}

/// Returns the id that was removed.
pub async fn remove_command(
    store: &dyn UserStore,
    user: &User,
    id: Option<&RawId>,
) -> AppResult<i64> {
    let id = command_id(id, "removal")?;
    let modified = store
        .pull(user.id, Collection::Commands, json!(id))
        .await
        .map_err(|e| AppError::server("Server error during command removal", e))?;
    if modified == 0 {
        warn!(user_id = %user.id, command_id = id, "command removal matched nothing");
        return Err(AppError::not_found("Command not found or already removed"));
    }

    info!(user_id = %user.id, command_id = id, "command removed");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::repo_types::NewUser,
        store::MemoryUserStore,
    };
    use std::sync::Arc;

    async fn user(store: &MemoryUserStore, name: &str) -> User {
        store
            .insert(NewUser {
                username: name.into(),
                password_hash: "x".into(),
                token: format!("tok-{name}"),
            })
            .await
            .unwrap()
    }

    async fn reload(store: &MemoryUserStore, u: &User) -> User {
        store.find_by_token(&u.token).await.unwrap().unwrap()
    }

    fn add(cmd: &str) -> AddCommandRequest {
        AddCommandRequest {
            command: Some(cmd.into()),
            ..Default::default()
        }
    }

    fn ids(u: &User) -> Vec<i64> {
        u.commands.iter().map(|c| c.id).collect()
    }

    #[test]
    fn next_id_uses_tail_not_maximum() {
        let mk = |id| Command {
            id,
            command: "x".into(),
            description: String::new(),
            last_used: "2024-01-01".into(),
        };
        assert_eq!(next_command_id(&[]).unwrap(), 1);
        assert_eq!(next_command_id(&[mk(1), mk(2)]).unwrap(), 3);
        assert_eq!(next_command_id(&[mk(9), mk(4)]).unwrap(), 5);
        assert!(matches!(
            next_command_id(&[mk(i64::MAX)]),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn add_defaults_and_first_id() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;

        let c = add_command(&store, &u, add("ls -la")).await.unwrap();
        assert_eq!(
            c,
            Command {
                id: 1,
                command: "ls -la".into(),
                description: String::new(),
                last_used: today(),
            }
        );
        assert_eq!(reload(&store, &u).await.commands, vec![c]);
    }

    #[tokio::test]
    async fn add_keeps_supplied_fields() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;
        let c = add_command(
            &store,
            &u,
            AddCommandRequest {
                command: Some("df -h".into()),
                description: Some("disk".into()),
                last_used: Some("2024-05-01".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(c.description, "disk");
        assert_eq!(c.last_used, "2024-05-01");
    }

    #[tokio::test]
    async fn add_requires_command_text() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;
        for req in [AddCommandRequest::default(), add(""), add("  ")] {
            let err = add_command(&store, &u, req).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert!(reload(&store, &u).await.commands.is_empty());
    }

    #[tokio::test]
    async fn add_then_import_continue_the_sequence() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;
        add_command(&store, &u, add("a")).await.unwrap();
        let u = reload(&store, &u).await;
        add_command(&store, &u, add("b")).await.unwrap();
        let u = reload(&store, &u).await;
        assert_eq!(ids(&u), vec![1, 2]);

        let c = add_command(&store, &u, add("c")).await.unwrap();
        assert_eq!(c.id, 3);
        let u = reload(&store, &u).await;

        let imported = import_commands(&store, &u, Some(vec![add("d"), add("e")]))
            .await
            .unwrap();
        assert_eq!(imported.iter().map(|c| c.id).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(imported[0].command, "d");
        assert_eq!(imported[1].command, "e");
        assert_eq!(ids(&reload(&store, &u).await), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn removed_middle_id_does_not_reset_the_tail() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;
        import_commands(&store, &u, Some(vec![add("a"), add("b"), add("c")]))
            .await
            .unwrap();
        let u = reload(&store, &u).await;

        remove_command(&store, &u, Some(&RawId::Int(2))).await.unwrap();
        let u = reload(&store, &u).await;
        assert_eq!(ids(&u), vec![1, 3]);

        let c = add_command(&store, &u, add("d")).await.unwrap();
        assert_eq!(c.id, 4);
    }

    #[tokio::test]
    async fn removing_the_tail_reissues_its_id() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;
        import_commands(&store, &u, Some(vec![add("a"), add("b")]))
            .await
            .unwrap();
        let u = reload(&store, &u).await;
        remove_command(&store, &u, Some(&RawId::Int(2))).await.unwrap();
        let u = reload(&store, &u).await;
        assert_eq!(add_command(&store, &u, add("c")).await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn import_rejects_empty_or_invalid_batches() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;
        for items in [None, Some(vec![]), Some(vec![add("ok"), add("")])] {
            let err = import_commands(&store, &u, items).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert!(reload(&store, &u).await.commands.is_empty());
    }

    #[tokio::test]
    async fn tail_at_max_id_fails_without_writing() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;
        let last = json!({
            "id": i64::MAX - 1,
            "command": "legacy",
            "description": "",
            "last_used": "2020-01-01",
        });
        store.push(u.id, Collection::Commands, vec![last]).await.unwrap();
        let u = reload(&store, &u).await;

        let err = import_commands(&store, &u, Some(vec![add("a"), add("b")]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Server { .. }));
        assert_eq!(ids(&reload(&store, &u).await), vec![i64::MAX - 1]);

        let c = add_command(&store, &u, add("a")).await.unwrap();
        assert_eq!(c.id, i64::MAX);
        let u = reload(&store, &u).await;
        let err = add_command(&store, &u, add("b")).await.unwrap_err();
        assert!(matches!(err, AppError::Server { .. }));
        assert_eq!(u.commands.len(), 2);
    }

    #[tokio::test]
    async fn update_applies_partial_fields() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;
        import_commands(&store, &u, Some(vec![add("a"), add("b")]))
            .await
            .unwrap();
        let u = reload(&store, &u).await;
        let before = u.commands.clone();

        let id = update_command(
            &store,
            &u,
            Some(&RawId::Text("2".into())),
            CommandPatch {
                description: Some("second".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(id, 2);

        let after = reload(&store, &u).await.commands;
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1].command, "b");
        assert_eq!(after[1].description, "second");
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found_and_touches_nothing() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;
        import_commands(&store, &u, Some(vec![add("a"), add("b")]))
            .await
            .unwrap();
        let u = reload(&store, &u).await;

        let err = update_command(
            &store,
            &u,
            Some(&RawId::Int(7)),
            CommandPatch {
                command: Some("rm -rf".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(reload(&store, &u).await.commands, u.commands);
    }

    #[tokio::test]
    async fn update_without_change_reports_not_found() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;
        add_command(&store, &u, add("a")).await.unwrap();
        let u = reload(&store, &u).await;
        let err = update_command(
            &store,
            &u,
            Some(&RawId::Int(1)),
            CommandPatch {
                command: Some("a".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_and_remove_validate_ids() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;
        let patch = || CommandPatch {
            command: Some("x".into()),
            ..Default::default()
        };
        for raw in [None, Some(RawId::Int(0)), Some(RawId::Text("abc".into()))] {
            let err = update_command(&store, &u, raw.as_ref(), patch()).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
            let err = remove_command(&store, &u, raw.as_ref()).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        let err = update_command(&store, &u, Some(&RawId::Int(1)), CommandPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn remove_missing_is_not_found() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;
        let err = remove_command(&store, &u, Some(&RawId::Int(1))).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn round_trip_add_update_remove() {
        let store = MemoryUserStore::new();
        let u = user(&store, "alice").await;

        let c = add_command(&store, &u, add("ls")).await.unwrap();
        let u = reload(&store, &u).await;
        assert_eq!(u.commands, vec![c.clone()]);

        update_command(
            &store,
            &u,
            Some(&RawId::Int(c.id)),
            CommandPatch {
                command: Some("ls -la".into()),
                last_used: Some("2024-02-02".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let u = reload(&store, &u).await;
        assert_eq!(
            u.commands,
            vec![Command {
                id: 1,
                command: "ls -la".into(),
                description: String::new(),
                last_used: "2024-02-02".into(),
            }]
        );

        remove_command(&store, &u, Some(&RawId::Int(1))).await.unwrap();
        assert!(reload(&store, &u).await.commands.is_empty());
    }

    #[tokio::test]
    async fn concurrent_users_keep_independent_sequences() {
        let store = Arc::new(MemoryUserStore::new());
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;

        let run = |u: User| {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..10 {
                    let fresh = store.find_by_token(&u.token).await.unwrap().unwrap();
                    add_command(store.as_ref(), &fresh, add(&format!("cmd {i}")))
                        .await
                        .unwrap();
                }
            })
        };
        let (a, b) = tokio::join!(run(alice.clone()), run(bob.clone()));
        a.unwrap();
        b.unwrap();

        let expected: Vec<i64> = (1..=10).collect();
        assert_eq!(ids(&reload(&store, &alice).await), expected);
        assert_eq!(ids(&reload(&store, &bob).await), expected);
    }
}
