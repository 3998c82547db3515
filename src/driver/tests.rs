use super::*;
use crate::display::mock::{MockDisplay, blank, fill};
use crate::match_image::{Offset, Reference};
use std::cell::Cell;
use std::sync::Arc;
use tokio::time::Instant;

const GREEN: Rgb<u8> = Rgb([60, 200, 80]);

fn button() -> Arc<VisualElement> {
    Arc::new(VisualElement::new("CONFIRM", Area::new(100, 100, 140, 120), GREEN))
}

/// Display that always shows the confirm button
fn showing_button() -> MockDisplay<()> {
    MockDisplay::new((), |_: &()| {
        let mut frame = blank();
        fill(&mut frame, Area::new(100, 100, 140, 120), GREEN);
        frame
    })
}

fn driver<S>(display: MockDisplay<S>) -> ActionDriver<MockDisplay<S>> {
    ActionDriver::new(display, MatchConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_appear_requires_frame() {
    let mut driver = driver(showing_button());
    assert!(driver.appear(&button(), Detect::color()).is_err());
    driver.screenshot().await.unwrap();
    assert!(driver.appear(&button(), Detect::color()).unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_interval_suppresses_repeat_detection() {
    let mut driver = driver(showing_button());
    let element = button();
    driver.screenshot().await.unwrap();

    let detect = Detect::color().interval(2.0);
    assert!(driver.appear(&element, detect).unwrap());
    assert!(!driver.appear(&element, detect).unwrap(), "Suppressed inside the interval");

    tokio::time::advance(Duration::from_millis(2100)).await;
    assert!(driver.appear(&element, detect).unwrap(), "Interval passed");

    driver.interval_clear(&[element.as_ref()]);
    assert!(driver.appear(&element, detect).unwrap(), "Cleared interval fires at once");

    driver.interval_reset(&[element.as_ref()]);
    assert!(!driver.appear(&element, detect).unwrap());
    assert!(driver.appear(&element, Detect::color()).unwrap(), "No interval, no suppression");
}

#[tokio::test(start_paused = true)]
async fn test_screenshot_is_paced() {
    let mut driver = driver(showing_button());
    let start = Instant::now();
    for _ in 0..5 {
        driver.screenshot().await.unwrap();
    }
    assert!(start.elapsed() >= Duration::from_millis(400));
    assert_eq!(driver.channel().captures, 5);
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_propagates() {
    let mut display = showing_button();
    display.fail_capture = true;
    let mut driver = driver(display);
    let err = driver.screenshot().await.unwrap_err();
    assert!(matches!(err, AutomationError::Capture { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_appear_then_click() {
    let display = MockDisplay::new(0usize, |_: &usize| blank());
    let mut driver = driver(display);
    let element = button();
    // Nothing is ever shown, so bound the wait from outside.
    let waited = tokio::time::timeout(
        Duration::from_secs(3),
        driver.wait_until_appear(&element, Detect::color(), false),
    )
    .await;
    assert!(waited.is_err(), "Unbounded wait keeps polling");

    let mut driver = self::driver(showing_button());
    driver.wait_until_appear_then_click(&element, Detect::color()).await.unwrap();
    assert_eq!(driver.channel().taps_in(element.button()), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_disappear() {
    let display = MockDisplay::new(0usize, |taps: &usize| {
        let mut frame = blank();
        if *taps == 0 {
            fill(&mut frame, Area::new(100, 100, 140, 120), GREEN);
        }
        frame
    })
    .on_tap(|taps, _| *taps += 1);
    let mut driver = driver(display);
    let element = button();
    driver.screenshot().await.unwrap();
    assert!(driver.appear_then_click(&element, Detect::color()).await.unwrap());
    driver.wait_until_disappear(&element, Detect::color()).await.unwrap();
    assert_eq!(driver.channel().taps.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_match_then_click_uses_learned_offset() {
    let icon = RgbImage::from_fn(20, 12, |x, y| {
        let v = if (x * x + 5 * y) % 7 < 3 { 250 } else { 10 };
        Rgb([v, 255 - v, (x * 11) as u8])
    });
    let reference = icon.clone();
    let display = MockDisplay::new((), move |_: &()| {
        let mut frame = blank();
        image::imageops::replace(&mut frame, &icon, 60, 75);
        frame
    });
    let element = VisualElement::new("REWARD", Area::new(60, 60, 80, 72), Rgb([0, 0, 0]))
        .with_reference(Reference::Static(reference));
    let mut driver = driver(display);
    driver.screenshot().await.unwrap();

    let started = Instant::now();
    assert!(driver.match_then_click(&element, Some(SearchOffset::Vertical(20)), None).await.unwrap());
    assert!(started.elapsed() >= driver.config().settle_delay, "Settles before clicking");
    assert_eq!(element.offset(), Some(Offset::new(0, 15)));
    assert_eq!(driver.channel().taps_in(Area::new(60, 75, 80, 87)), 1);
}

/// Region with a bar that moves for the first `settle_after` captures, then stays put
fn moving_bar(settle_after: Option<usize>) -> MockDisplay<Cell<usize>> {
    MockDisplay::new(Cell::new(0usize), move |n: &Cell<usize>| {
        let i = n.get();
        n.set(i + 1);
        let x = match settle_after {
            Some(limit) if i >= limit => 132,
            _ => 100 + ((i * 7) % 35) as i32,
        };
        let mut frame = blank();
        fill(&mut frame, Area::new(x, 100, x + 5, 110), Rgb([230, 230, 230]));
        frame
    })
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_stable_after_animation() {
    let mut driver = driver(moving_bar(Some(6)));
    let element = VisualElement::new("PANEL", Area::new(100, 100, 140, 110), GREEN);
    let stable = driver
        .wait_until_stable(&element, Timer::secs(0.3, 1), Timer::secs(8.0, 10), false)
        .await
        .unwrap();
    assert!(stable);
    assert!(driver.channel().captures > 6, "Stability is only judged after the motion stops");
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_stable_gives_up() {
    let mut driver = driver(moving_bar(None));
    let element = VisualElement::new("SPINNER", Area::new(100, 100, 140, 110), GREEN);
    let started = Instant::now();
    let stable = driver
        .wait_until_stable(&element, Timer::secs(0.3, 1), Timer::secs(2.0, 3), false)
        .await
        .unwrap();
    assert!(!stable, "Timeout returns false");
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_image_color_count() {
    let mut driver = driver(showing_button());
    driver.screenshot().await.unwrap();
    // 40 x 20 = 800 green pixels
    assert!(driver.image_color_count(Area::new(90, 90, 150, 130), GREEN, 221, 700).unwrap());
    assert!(!driver.image_color_count(Area::new(90, 90, 150, 130), GREEN, 221, 800).unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_evaluate_checks() {
    let mut driver = driver(showing_button());
    driver.screenshot().await.unwrap();
    let hidden = Arc::new(VisualElement::new("HIDDEN", Area::new(0, 0, 10, 10), GREEN));
    let shown = button();

    assert!(!driver.evaluate(&Check::element(&hidden)).unwrap());
    assert!(driver.evaluate(&Check::any_of([Check::element(&hidden), Check::element(&shown)])).unwrap());

    let dark_corner = Check::predicate("dark_corner", |frame: &Frame| frame.get_pixel(0, 0)[0] < 50);
    assert!(driver.evaluate(&dark_corner).unwrap());
    assert_eq!(
        Check::any_of([Check::element(&hidden), dark_corner]).elements().len(),
        1
    );
}
