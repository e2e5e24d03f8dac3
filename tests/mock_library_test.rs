#[cfg(feature = "mock")]
mod mock_tests {
    use discogs2music::{
        CancellationState, EventBroadcaster, LocalTrack, MockMusicLibrary, MusicLibrary,
        NormalizedKey, RatingRecord, RatingStore, ReconcileConfig, Reconciler, Result, TrackId,
    };
    use mockall::predicate::*;

    #[tokio::test]
    async fn test_mock_library_as_trait_object() -> Result<()> {
        let mut mock_library = MockMusicLibrary::new();
        mock_library
            .expect_list_tracks()
            .times(1)
            .returning(|| Ok(vec![LocalTrack::new("7", "Pixies", "Doolittle", "Hey")]));

        let library: &dyn MusicLibrary = &mock_library;
        let tracks = library.list_tracks().await?;
        assert_eq!(tracks[0].album, "Doolittle");
        Ok(())
    }

    #[tokio::test]
    async fn test_song_mode_only_touches_track_rating() -> Result<()> {
        let mut store = RatingStore::new();
        store.insert_if_absent(
            NormalizedKey::new("Pixies"),
            NormalizedKey::new("Doolittle"),
            RatingRecord::new(4),
        );

        let mut mock_library = MockMusicLibrary::new();
        mock_library
            .expect_list_tracks()
            .returning(|| Ok(vec![LocalTrack::new("7", "Pixies", "Doolittle", "Hey")]));
        mock_library
            .expect_set_track_rating()
            .with(eq(TrackId::from("7")), eq(80))
            .times(1)
            .returning(|_, _| Ok(()));
        mock_library.expect_set_album_rating().never();

        let reconciler = Reconciler::new(
            ReconcileConfig::default().with_granularity(discogs2music::Granularity::Song),
            EventBroadcaster::new(),
            CancellationState::new(),
        );
        let report = reconciler.reconcile(&store, &mock_library).await?;
        assert_eq!(report.summary().songs_updated, 1);
        Ok(())
    }
}
