#[cfg(test)]
mod store_contract_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use stats_types::{
        AbilityType, LeaderboardEntry, MobHealthbarType, PlayerRecord, SkillType, StatKey, MAX_LEVEL,
    };
    use tempfile::TempDir;

    use crate::clock::epoch_seconds;
    use crate::*;

    const MONTH: i64 = PurgeCutoff::MONTH_SECS as i64;

    /// Both backends over fresh storage in `dir`.
    pub async fn setup_test_stores(dir: &TempDir) -> Vec<(&'static str, Arc<dyn StatsStore>)> {
        let flatfile = FlatfileStore::new(
            dir.path().join("mcmmo.users"),
            MobHealthbarType::Hearts,
            Duration::from_secs(600),
            Arc::new(ManualClock::new()),
            Arc::new(NoopHooks),
        );
        let url = format!("sqlite://{}", dir.path().join("mcmmo.db").display());
        let relational = RelationalStore::open(
            SqliteConnector::new(&url).expect("Failed to parse database url"),
            BackoffPolicy::default(),
            Arc::new(ManualClock::new()),
            "mcmmo_",
            MobHealthbarType::Hearts,
            Arc::new(NoopHooks),
        )
        .await
        .expect("Failed to open relational store");

        vec![
            ("flatfile", Arc::new(flatfile) as Arc<dyn StatsStore>),
            ("sqlite", Arc::new(relational) as Arc<dyn StatsStore>),
        ]
    }

    fn player(name: &str, skill: SkillType, level: u32) -> PlayerRecord {
        let mut record = PlayerRecord::new(name, MobHealthbarType::Hearts, epoch_seconds());
        record.set_level(skill, level);
        record
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_value() {
        let dir = TempDir::new().unwrap();
        for (backend, store) in setup_test_stores(&dir).await {
            assert!(store.save_record(&player("Alice", SkillType::Mining, 10)).await);
            assert!(store.save_record(&player("Bob", SkillType::Mining, 20)).await);

            let board = store
                .read_leaderboard(StatKey::Skill(SkillType::Mining), 1, 10)
                .await;
            assert_eq!(
                board,
                vec![LeaderboardEntry::new("Bob", 20), LeaderboardEntry::new("Alice", 10)],
                "{backend}"
            );
        }
    }

    #[tokio::test]
    async fn test_ties_break_by_name() {
        let dir = TempDir::new().unwrap();
        for (backend, store) in setup_test_stores(&dir).await {
            for name in ["carol", "Alice", "bob"] {
                store.save_record(&player(name, SkillType::Swords, 7)).await;
            }
            store.save_record(&player("Zed", SkillType::Swords, 9)).await;

            let names: Vec<String> = store
                .read_leaderboard(StatKey::Skill(SkillType::Swords), 1, 10)
                .await
                .into_iter()
                .map(|entry| entry.name)
                .collect();
            assert_eq!(names, vec!["Zed", "Alice", "bob", "carol"], "{backend}");

            let swords = StatKey::Skill(SkillType::Swords);
            assert_eq!(store.read_rank("Zed").await.get(swords), Some(1), "{backend}");
            assert_eq!(store.read_rank("alice").await.get(swords), Some(2), "{backend}");
            assert_eq!(store.read_rank("bob").await.get(swords), Some(3), "{backend}");
            assert_eq!(store.read_rank("carol").await.get(swords), Some(4), "{backend}");
        }
    }

    #[tokio::test]
    async fn test_power_level_board_and_rank() {
        let dir = TempDir::new().unwrap();
        for (backend, store) in setup_test_stores(&dir).await {
            let mut alice = player("Alice", SkillType::Mining, 10);
            alice.set_level(SkillType::Fishing, 15);
            store.save_record(&alice).await;
            store.save_record(&player("Bob", SkillType::Axes, 20)).await;

            let board = store.read_leaderboard(StatKey::PowerLevel, 1, 10).await;
            assert_eq!(
                board,
                vec![LeaderboardEntry::new("Alice", 25), LeaderboardEntry::new("Bob", 20)],
                "{backend}"
            );

            let ranks = store.read_rank("Bob").await;
            assert_eq!(ranks.get(StatKey::PowerLevel), Some(2), "{backend}");
            assert_eq!(ranks.get(StatKey::Skill(SkillType::Axes)), Some(1), "{backend}");
            assert_eq!(ranks.get(StatKey::Skill(SkillType::Mining)), None, "{backend}");
        }
    }

    #[tokio::test]
    async fn test_pages() {
        let dir = TempDir::new().unwrap();
        for (backend, store) in setup_test_stores(&dir).await {
            for (i, name) in ["a", "b", "c", "d", "e"].iter().enumerate() {
                store
                    .save_record(&player(name, SkillType::Archery, 10 - i as u32))
                    .await;
            }
            let archery = StatKey::Skill(SkillType::Archery);
            let second: Vec<u32> = store
                .read_leaderboard(archery, 2, 2)
                .await
                .iter()
                .map(|entry| entry.value)
                .collect();
            assert_eq!(second, vec![8, 7], "{backend}");
            assert_eq!(store.read_leaderboard(archery, 3, 2).await.len(), 1, "{backend}");
            assert!(store.read_leaderboard(archery, 4, 2).await.is_empty(), "{backend}");
            assert!(store.read_leaderboard(archery, 100, 10).await.is_empty(), "{backend}");
        }
    }

    #[tokio::test]
    async fn test_remove_then_load_is_not_found() {
        let dir = TempDir::new().unwrap();
        for (backend, store) in setup_test_stores(&dir).await {
            store.save_record(&player("Alice", SkillType::Herbalism, 3)).await;
            assert!(store.remove_record("Alice").await, "{backend}");
            assert!(
                matches!(
                    store.load_record("Alice", false).await,
                    Err(StoreError::NotFound(_))
                ),
                "{backend}"
            );
            assert!(!store.remove_record("Alice").await, "{backend}");
        }
    }

    #[tokio::test]
    async fn test_load_create_and_save_overwrite() {
        let dir = TempDir::new().unwrap();
        for (backend, store) in setup_test_stores(&dir).await {
            let mut record = store.load_record("Steve", true).await.unwrap();
            assert!(record.is_powerless(), "{backend}");

            record.set_level(SkillType::Repair, 4);
            record.set_xp(SkillType::Repair, 0.5);
            assert!(store.save_record(&record).await, "{backend}");
            assert_eq!(store.load_record("steve", false).await.unwrap(), record, "{backend}");

            record.set_level(SkillType::Repair, 5);
            assert!(store.save_record(&record).await, "{backend}");
            let reloaded = store.load_record("Steve", false).await.unwrap();
            assert_eq!(reloaded.level(SkillType::Repair), 5, "{backend}");
            assert_eq!(store.stored_names().await, vec!["Steve".to_string()], "{backend}");
        }
    }

    #[tokio::test]
    async fn test_levels_at_ceiling() {
        let dir = TempDir::new().unwrap();
        for (backend, store) in setup_test_stores(&dir).await {
            let mut maxed = PlayerRecord::new("Maxed", MobHealthbarType::Bar, epoch_seconds());
            for skill in SkillType::non_child_skills() {
                maxed.set_level(skill, MAX_LEVEL);
            }
            for (i, ability) in AbilityType::ALL.into_iter().enumerate() {
                maxed.set_cooldown(ability, 1_700_000_000 + i as i64);
            }
            assert!(store.save_record(&maxed).await, "{backend}");
            store.save_record(&player("Alice", SkillType::Mining, 10)).await;

            assert_eq!(store.load_record("Maxed", false).await.unwrap(), maxed, "{backend}");
            let power = store.read_leaderboard(StatKey::PowerLevel, 1, 10).await;
            assert_eq!(
                power,
                vec![
                    LeaderboardEntry::new("Maxed", u32::MAX),
                    LeaderboardEntry::new("Alice", 10)
                ],
                "{backend}"
            );
            let ranks = store.read_rank("Maxed").await;
            assert_eq!(ranks.get(StatKey::PowerLevel), Some(1), "{backend}");
            assert_eq!(ranks.get(StatKey::Skill(SkillType::Mining)), Some(1), "{backend}");
            assert!(store.purge_powerless().await.is_empty(), "{backend}");
        }
    }

    #[tokio::test]
    async fn test_purge_older_than_cutoff() {
        let dir = TempDir::new().unwrap();
        let now = epoch_seconds();
        for (backend, store) in setup_test_stores(&dir).await {
            let mut stale = player("Stale", SkillType::Mining, 5);
            stale.last_login = now - 7 * MONTH;
            let mut recent = player("Recent", SkillType::Mining, 5);
            recent.last_login = now - 5 * MONTH;
            store.save_record(&stale).await;
            store.save_record(&recent).await;

            assert!(store.purge_older_than(PurgeCutoff::Disabled).await.is_empty());
            let purged = store.purge_older_than(PurgeCutoff::months(6)).await;
            assert_eq!(purged, vec!["Stale".to_string()], "{backend}");
            assert_eq!(store.stored_names().await, vec!["Recent".to_string()], "{backend}");
        }
    }

    #[tokio::test]
    async fn test_purge_powerless() {
        let dir = TempDir::new().unwrap();
        for (backend, store) in setup_test_stores(&dir).await {
            store.create_record("Idle").await;
            store.save_record(&player("Busy", SkillType::Taming, 1)).await;

            assert_eq!(store.purge_powerless().await, vec!["Idle".to_string()], "{backend}");
            assert!(store.purge_powerless().await.is_empty(), "{backend}");
            assert!(store.health_check().await, "{backend}");
        }
    }
}
