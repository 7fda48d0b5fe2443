//! Full lifecycle through the public API: ingest, dispatch, admin, restart.

use tempfile::TempDir;

use hopper_db::{
    Frontier, GetParams, PutConfig, QueueWithinCrawl, StoreConfig, UrlInfo, UrlItem,
};

async fn put_all(frontier: &Frontier, items: Vec<UrlItem>) -> Vec<String> {
    let mut stream = frontier.put_urls(PutConfig::default());
    for item in items {
        stream.items.send(item).await.unwrap();
    }
    drop(stream.items);
    let mut acks = Vec::new();
    while let Some(url) = stream.acks.recv().await {
        acks.push(url);
    }
    acks
}

async fn get_all(frontier: &Frontier, params: GetParams) -> Vec<UrlInfo> {
    let mut rx = frontier.get_urls(params, 64);
    let mut infos = Vec::new();
    while let Some(info) = rx.recv().await {
        infos.push(info);
    }
    infos
}

#[tokio::test]
async fn crawl_lifecycle_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");

    {
        let frontier = Frontier::open(StoreConfig::with_path(&path)).unwrap();

        // Seed two hosts.
        let acks = put_all(
            &frontier,
            vec![
                UrlItem::Discovered {
                    info: UrlInfo::with_url("http://h1.example/start"),
                },
                UrlItem::Discovered {
                    info: UrlInfo::with_url("http://h2.example/start"),
                },
            ],
        )
        .await;
        assert_eq!(acks.len(), 2);
        assert_eq!(frontier.number_of_queues(), 2);

        // Both queues are dispatchable and serve one URL each.
        assert_eq!(frontier.list_queues(0).unwrap().len(), 2);
        let emitted = get_all(&frontier, GetParams::default()).await;
        assert_eq!(emitted.len(), 2);

        // Report the fetch outcomes: one done, one to refetch far out.
        put_all(
            &frontier,
            vec![
                UrlItem::Known {
                    info: UrlInfo::with_url("http://h1.example/start"),
                    refetchable_from: 0,
                },
                UrlItem::Known {
                    info: UrlInfo::with_url("http://h2.example/start"),
                    refetchable_from: u32::MAX as u64,
                },
            ],
        )
        .await;

        // Nothing is due anymore.
        assert!(get_all(&frontier, GetParams::default()).await.is_empty());
        assert!(frontier.list_queues(0).unwrap().is_empty());

        let stats = frontier.get_stats(None).unwrap();
        assert_eq!(stats.number_of_queues, 2);
        assert_eq!(stats.size, 2);
        assert_eq!(stats.counts["completed"], 1);
        assert_eq!(stats.counts["scheduled"], 1);

        frontier.close().unwrap();
    }

    // Counts survive a restart.
    let frontier = Frontier::open(StoreConfig::with_path(&path)).unwrap();
    let stats = frontier.get_stats(None).unwrap();
    assert_eq!(stats.number_of_queues, 2);
    assert_eq!(stats.size, 2);
    assert_eq!(stats.counts["completed"], 1);
    assert_eq!(stats.counts["scheduled"], 1);

    // Tear down one host, then the rest of the crawl.
    let removed = frontier
        .delete_queue(&QueueWithinCrawl::new("", "h1.example"))
        .unwrap();
    assert_eq!(removed, 1);
    let removed = frontier.delete_crawl("").unwrap();
    assert_eq!(removed, 1);
    assert_eq!(frontier.number_of_queues(), 0);
    assert!(get_all(&frontier, GetParams::default()).await.is_empty());
}
