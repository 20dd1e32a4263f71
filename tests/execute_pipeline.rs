//! End-to-end frame cycle over a scripted transport.

use hvcp2::{
    Device, Error, FeatureFlags, OutputImage, ResponseCode, ScriptedTransport, Session,
    SessionConfig, StubStabilizer, TrackingStatus, NOT_TRACKED,
};

/// Builds an Execute response body: counts header, one body record, one
/// face record with direction and age (the normalized Face|Age layout).
fn face_age_body(age: i8, age_conf: i16) -> Vec<u8> {
    let mut body = vec![1, 0, 1, 0];
    // body record
    for value in [80u16, 90, 140, 720] {
        body.extend_from_slice(&value.to_le_bytes());
    }
    // face record
    for value in [160u16, 120, 64, 940] {
        body.extend_from_slice(&value.to_le_bytes());
    }
    // direction (implied by age)
    for value in [8i16, -2, 1] {
        body.extend_from_slice(&value.to_le_bytes());
    }
    body.extend_from_slice(&790u16.to_le_bytes());
    // age
    body.push(age as u8);
    body.extend_from_slice(&age_conf.to_le_bytes());
    body
}

fn transport_for_session() -> ScriptedTransport {
    let mut transport = ScriptedTransport::new();
    // Settings applied at open: camera angle, thresholds, sizes, face angle.
    for _ in 0..4 {
        transport.queue_response(0x00, &[]);
    }
    transport
}

#[test]
fn stabilized_pipeline_tracks_identities_across_frames() {
    let mut transport = transport_for_session();
    transport.queue_response(0x00, &face_age_body(30, 900));
    transport.queue_response(0x00, &face_age_body(31, 910));

    let mut session = Session::open(
        Device::new(transport),
        FeatureFlags::BODY | FeatureFlags::FACE | FeatureFlags::AGE,
        Some(Box::new(StubStabilizer::new())),
        &SessionConfig::default(),
    )
    .unwrap();

    let first = session.execute(OutputImage::None).unwrap();
    assert_eq!(first.response, ResponseCode::Normal);
    assert_eq!(first.stabilizer_status, 0);

    let face = &first.tracking.faces[0];
    assert_eq!(face.detection_id, 0);
    let face_track = face.tracking_id;
    assert_ne!(face_track, NOT_TRACKED);
    let age = face.age.unwrap();
    assert_eq!(age.value, 30);
    assert_eq!(age.status, Some(TrackingStatus::Calculating));
    // Direction is frame-local: copied from the raw frame, no status.
    let direction = face.direction.unwrap();
    assert_eq!((direction.lr, direction.ud, direction.roll), (8, -2, 1));

    let body_track = first.tracking.bodies[0].tracking_id;
    assert_ne!(body_track, NOT_TRACKED);
    assert_ne!(body_track, face_track);

    // Identities persist into the next frame.
    let second = session.execute(OutputImage::None).unwrap();
    assert_eq!(second.tracking.faces[0].tracking_id, face_track);
    assert_eq!(second.tracking.bodies[0].tracking_id, body_track);
    assert_eq!(second.tracking.faces[0].age.unwrap().value, 31);
}

#[test]
fn pass_through_pipeline_leaves_everything_untracked() {
    let mut transport = transport_for_session();
    transport.queue_response(0x00, &face_age_body(30, 900));

    let mut session = Session::open(
        Device::new(transport),
        FeatureFlags::BODY | FeatureFlags::FACE | FeatureFlags::AGE,
        None,
        &SessionConfig::default(),
    )
    .unwrap();

    let capture = session.execute(OutputImage::None).unwrap();
    let face = &capture.tracking.faces[0];
    assert_eq!(face.tracking_id, NOT_TRACKED);
    let age = face.age.unwrap();
    assert_eq!(age.value, 30);
    assert_eq!(age.confidence, 900);
    assert_eq!(age.status, None);
    assert_eq!(capture.tracking.bodies[0].tracking_id, NOT_TRACKED);
}

#[test]
fn output_image_rides_behind_the_detection_records() {
    let mut transport = transport_for_session();
    let mut body = face_age_body(25, 800);
    body.extend_from_slice(&4u16.to_le_bytes());
    body.extend_from_slice(&2u16.to_le_bytes());
    body.extend_from_slice(&[0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80]);
    transport.queue_response(0x00, &body);

    let mut session = Session::open(
        Device::new(transport),
        FeatureFlags::BODY | FeatureFlags::FACE | FeatureFlags::AGE,
        Some(Box::new(StubStabilizer::new())),
        &SessionConfig::default(),
    )
    .unwrap();

    let capture = session.execute(OutputImage::Qqvga).unwrap();
    let image = capture.image.unwrap();
    assert_eq!((image.width, image.height), (4, 2));
    assert_eq!(image.data.len(), 8);
    assert_eq!(capture.tracking.faces.len(), 1);
}

#[test]
fn registration_error_leaves_the_channel_clean() {
    let transport = transport_for_session();
    let mut session = Session::open(
        Device::new(transport),
        FeatureFlags::FACE | FeatureFlags::RECOGNITION,
        None,
        &SessionConfig::default(),
    )
    .unwrap();

    let mut raw = vec![0xFE, 0x01];
    raw.extend_from_slice(&0u32.to_le_bytes());
    session.device_mut().transport_mut().queue_raw(&raw);

    let err = session.device_mut().register_data(0, 0).unwrap_err();
    match err {
        Error::Device(code) => assert_eq!(code, ResponseCode::NoFace),
        other => panic!("expected Device error, got {:?}", other),
    }
    assert_eq!(session.device_mut().transport_mut().unread(), 0);
}

#[test]
fn reset_tracking_restarts_identity_assignment() {
    let mut transport = transport_for_session();
    transport.queue_response(0x00, &face_age_body(30, 900));
    transport.queue_response(0x00, &face_age_body(30, 900));

    let mut session = Session::open(
        Device::new(transport),
        FeatureFlags::FACE | FeatureFlags::AGE,
        Some(Box::new(StubStabilizer::new())),
        &SessionConfig::default(),
    )
    .unwrap();

    let first = session.execute(OutputImage::None).unwrap();
    session.reset_tracking().unwrap();
    let second = session.execute(OutputImage::None).unwrap();

    // The stub reassigns from zero after a reset.
    assert_eq!(first.tracking.faces[0].tracking_id, 0);
    assert_eq!(second.tracking.faces[0].tracking_id, 0);
}
