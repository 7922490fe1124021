//! 本地 HTTP Server 模块测试

use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::Value;

    use crate::analytics::StatsWindow;
    use crate::dashboard::{DashboardMonitor, MonitorConfig};
    use crate::local_server::LocalServer;
    use crate::models::{FreezingStatus, ProductStatus};
    use crate::session::SessionProvider;
    use crate::storage::LocalStore;
    use crate::test_support::*;

    struct TestApp {
        server: LocalServer,
        sessions: SessionProvider,
        monitor: DashboardMonitor,
        store: LocalStore,
    }

    fn test_app() -> TestApp {
        let store = LocalStore::in_memory().unwrap();
        let sessions = SessionProvider::new();
        let monitor = DashboardMonitor::spawn(
            Arc::new(store.clone()),
            sessions.clone(),
            MonitorConfig::default(),
        );
        let server = LocalServer::new(sessions.clone(), monitor.handle(), Arc::new(store.clone()));
        TestApp {
            server,
            sessions,
            monitor,
            store,
        }
    }

    fn url(port: u16, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", port, path)
    }

    #[tokio::test]
    async fn test_server_start_and_stop() {
        let app = test_app();

        let handle = app.server.start(19900).await;
        assert!(handle.is_ok());

        let handle = handle.unwrap();
        assert_eq!(handle.port(), 19900);

        // 关闭 Server
        handle.shutdown();

        // 等待关闭完成
        tokio::time::sleep(Duration::from_millis(100)).await;

        // 端口应该可用
        assert!(LocalServer::check_port_available(19900).await);
    }

    #[tokio::test]
    async fn test_server_port_validation() {
        let app = test_app();

        // 特权端口应该被拒绝
        let result = app.server.start(80).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_port_in_use_is_reported() {
        let app = test_app();
        let _first = app.server.start(19901).await.unwrap();

        let second = app.server.start(19901).await;
        assert!(second.is_err());
        assert!(!LocalServer::check_port_available(19901).await);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app();
        let _handle = app.server.start(19902).await.unwrap();

        let resp = reqwest::get(url(19902, "/api/health")).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "haccp-dashboard");
    }

    #[tokio::test]
    async fn test_record_pages_require_session() {
        let app = test_app();
        let _handle = app.server.start(19903).await.unwrap();
        let client = reqwest::Client::new();

        for path in [
            "/api/temperature",
            "/api/products",
            "/api/receptions",
            "/api/freezing",
            "/api/cleaning",
        ] {
            let resp = client.get(url(19903, path)).send().await.unwrap();
            assert_eq!(resp.status(), 401, "{path}");
            let body: Value = resp.json().await.unwrap();
            assert_eq!(body["code"], "NO_SESSION");
        }

        let resp = client
            .post(url(19903, "/api/dashboard/refresh"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);

        // 未登录时快照为空
        let snapshot: Value = client
            .get(url(19903, "/api/dashboard/stats"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(snapshot["account"].is_null());
        assert!(snapshot["stats"].is_null());
        assert_eq!(snapshot["loading"], false);
    }

    #[tokio::test]
    async fn test_sign_in_then_stats() {
        let app = test_app();
        let eq = fridge("alice", "Chambre froide");
        app.store.insert_equipment(&eq).unwrap();
        let now = Utc::now();
        for i in 0..4 {
            app.store
                .insert_temperature_reading(&reading("alice", &eq.id, now, i != 0))
                .unwrap();
        }

        let _handle = app.server.start(19904).await.unwrap();
        let client = reqwest::Client::new();

        let resp = client
            .post(url(19904, "/api/session"))
            .json(&serde_json::json!({ "account_id": "alice" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["signedIn"], true);
        assert_eq!(body["session"]["account"], "alice");

        let mut rx = app.monitor.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.stats.is_some() && !s.loading),
        )
        .await
        .unwrap()
        .unwrap();

        let snapshot: Value = client
            .get(url(19904, "/api/dashboard/stats"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(snapshot["account"], "alice");
        assert_eq!(snapshot["stats"]["equipmentCount"], 1);
        assert!(snapshot["error"].is_null());
        assert_eq!(snapshot["stale"], false);
    }

    #[tokio::test]
    async fn test_blank_account_rejected() {
        let app = test_app();
        let _handle = app.server.start(19905).await.unwrap();

        let resp = reqwest::Client::new()
            .post(url(19905, "/api/session"))
            .json(&serde_json::json!({ "account_id": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert!(app.sessions.current().is_none());
    }

    #[tokio::test]
    async fn test_record_pages_are_scoped() {
        let app = test_app();
        let window = StatsWindow::now_local();
        let now = Utc::now();

        let eq = fridge("alice", "Frigo 1");
        app.store.insert_equipment(&eq).unwrap();
        app.store.insert_equipment(&fridge("bob", "Frigo bob")).unwrap();
        for i in 0..3 {
            app.store
                .insert_temperature_reading(&reading(
                    "alice",
                    &eq.id,
                    now - ChronoDuration::minutes(i),
                    true,
                ))
                .unwrap();
        }
        app.store
            .insert_product(&product(
                "alice",
                ProductStatus::Active,
                window.today + ChronoDuration::days(2),
            ))
            .unwrap();
        app.store
            .insert_product(&product("bob", ProductStatus::Active, window.today))
            .unwrap();
        app.store.insert_reception(&reception("alice", now, false)).unwrap();
        app.store
            .insert_freezing_record(&freezing(
                "alice",
                FreezingStatus::Frozen,
                now - ChronoDuration::days(3),
            ))
            .unwrap();
        app.store.insert_room(&room("alice", "Cuisine")).unwrap();
        app.store
            .insert_cleaning_task(&cleaning_task("alice", window.today, Some(now), false))
            .unwrap();
        app.store
            .insert_cleaning_record(&cleaning_record("alice", now))
            .unwrap();

        app.sessions.sign_in(account("alice"));
        let _handle = app.server.start(19906).await.unwrap();
        let client = reqwest::Client::new();
        let get = |path: &'static str| {
            let client = client.clone();
            async move {
                let resp = client.get(url(19906, path)).send().await.unwrap();
                assert_eq!(resp.status(), 200, "{path}");
                resp.json::<Value>().await.unwrap()
            }
        };

        let temperature = get("/api/temperature?limit=2").await;
        assert_eq!(temperature["equipment"].as_array().unwrap().len(), 1);
        assert_eq!(temperature["readings"].as_array().unwrap().len(), 2);
        assert_eq!(temperature["summary"]["complianceRate"], 100);

        let products = get("/api/products").await;
        assert_eq!(products["products"].as_array().unwrap().len(), 1);
        assert_eq!(products["products"][0]["days_until_expiry"], 2);
        assert_eq!(products["products"][0]["expiry_status"], "critical");
        assert_eq!(products["summary"]["expiringThisWeek"], 1);

        let receptions = get("/api/receptions").await;
        assert_eq!(receptions["summary"]["nonConform"], 1);
        assert_eq!(receptions["summary"]["complianceRate"], 0);

        let freezing = get("/api/freezing").await;
        assert_eq!(freezing["records"][0]["days_frozen"], 3);
        assert_eq!(freezing["summary"]["frozen"], 1);

        let cleaning = get("/api/cleaning").await;
        assert_eq!(cleaning["rooms"].as_array().unwrap().len(), 1);
        assert_eq!(cleaning["history"].as_array().unwrap().len(), 1);
        assert_eq!(cleaning["summary"]["completionRate"], 100);
    }

    #[tokio::test]
    async fn test_refresh_and_sign_out() {
        let app = test_app();
        app.sessions.sign_in(account("alice"));
        let _handle = app.server.start(19907).await.unwrap();
        let client = reqwest::Client::new();

        let resp = client
            .post(url(19907, "/api/dashboard/refresh"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);

        let resp = client.delete(url(19907, "/api/session")).send().await.unwrap();
        assert_eq!(resp.status(), 204);
        assert!(app.sessions.current().is_none());

        let session: Value = client
            .get(url(19907, "/api/session"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(session["signedIn"], false);

        let mut rx = app.monitor.subscribe();
        let cleared = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.account.is_none()),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert!(cleared.stats.is_none());
    }

    #[tokio::test]
    async fn test_refresh_after_monitor_stopped() {
        let app = test_app();
        app.sessions.sign_in(account("alice"));
        let _handle = app.server.start(19908).await.unwrap();

        app.monitor.shutdown().await;

        let resp = reqwest::Client::new()
            .post(url(19908, "/api/dashboard/refresh"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "INTERNAL_ERROR");
    }
}
