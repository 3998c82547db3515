use super::*;
use crate::display::mock::{MockDisplay, blank, fill};
use crate::driver::{ActionDriver, Check, Detect};
use crate::error::AutomationError;
use crate::match_image::{Area, MatchConfig, Point, VisualElement};
use image::Rgb;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn driver<S>(display: MockDisplay<S>) -> ActionDriver<MockDisplay<S>> {
    ActionDriver::new(display, MatchConfig::default())
}

fn color_pages() -> NavigatorConfig {
    NavigatorConfig {
        page_offset: None,
        ..NavigatorConfig::default()
    }
}

// ========== Game fixture ==========

const TITLE: Area = Area { x1: 10, y1: 10, x2: 60, y2: 30 };
const TITLE_COLORS: [Rgb<u8>; 3] = [Rgb([200, 60, 60]), Rgb([60, 60, 200]), Rgb([60, 200, 60])];
const MAIN_GOTO_CAMPAIGN: Area = Area { x1: 250, y1: 200, x2: 300, y2: 230 };
const CAMPAIGN_GOTO_STAGE: Area = Area { x1: 150, y1: 200, x2: 200, y2: 230 };
const BACK: Area = Area { x1: 10, y1: 200, x2: 50, y2: 230 };
const HOME: Area = Area { x1: 270, y1: 10, x2: 310, y2: 30 };
const CONFIRM: Area = Area { x1: 100, y1: 120, x2: 150, y2: 140 };
const CANCEL: Area = Area { x1: 170, y1: 120, x2: 220, y2: 140 };
const FLEET: Area = Area { x1: 120, y1: 60, x2: 200, y2: 90 };
const HOME_COLOR: Rgb<u8> = Rgb([230, 230, 90]);
const CONFIRM_COLOR: Rgb<u8> = Rgb([80, 180, 230]);
const CANCEL_COLOR: Rgb<u8> = Rgb([150, 150, 150]);
const FLEET_COLOR: Rgb<u8> = Rgb([240, 140, 40]);
const BACK_COLOR: Rgb<u8> = Rgb([120, 40, 120]);

const MAIN: usize = 0;
const CAMPAIGN: usize = 1;
const STAGE: usize = 2;

#[derive(Default)]
struct Game {
    page: Option<usize>,
    popup: bool,
    popup_on_campaign: bool,
    home: bool,
    fleet: bool,
}

fn game(game: Game) -> MockDisplay<Game> {
    MockDisplay::new(game, |game: &Game| {
        let mut frame = blank();
        if game.popup {
            fill(&mut frame, CONFIRM, CONFIRM_COLOR);
            fill(&mut frame, CANCEL, CANCEL_COLOR);
            return frame;
        }
        if let Some(page) = game.page {
            fill(&mut frame, TITLE, TITLE_COLORS[page]);
            if page != MAIN {
                fill(&mut frame, BACK, BACK_COLOR);
            }
        }
        if game.home {
            fill(&mut frame, HOME, HOME_COLOR);
        }
        if game.fleet {
            fill(&mut frame, FLEET, FLEET_COLOR);
        }
        frame
    })
    .on_tap(|game, point| {
        if game.popup {
            if CONFIRM.contains(point) {
                game.popup = false;
            }
            return;
        }
        if game.home && HOME.contains(point) {
            game.home = false;
            game.page = Some(MAIN);
            return;
        }
        game.page = match (game.page, point) {
            (Some(MAIN), p) if MAIN_GOTO_CAMPAIGN.contains(p) => {
                game.popup = game.popup_on_campaign;
                Some(CAMPAIGN)
            }
            (Some(CAMPAIGN), p) if CAMPAIGN_GOTO_STAGE.contains(p) => Some(STAGE),
            (Some(CAMPAIGN), p) if BACK.contains(p) => Some(MAIN),
            (Some(STAGE), p) if BACK.contains(p) => Some(CAMPAIGN),
            (page, _) => page,
        };
    })
}

struct Pages {
    graph: PageGraph,
    main: PageId,
    campaign: PageId,
    stage: PageId,
    back: Arc<VisualElement>,
}

fn pages() -> Pages {
    let check = |name: &str, page: usize| Arc::new(VisualElement::new(name, TITLE, TITLE_COLORS[page]));
    let button = |name: &str, area: Area| Arc::new(VisualElement::new(name, area, Rgb([0, 0, 0])));
    let back = Arc::new(VisualElement::new("BACK_ARROW", BACK, BACK_COLOR));

    let mut graph = PageGraph::new();
    let main = graph.add_page("page_main", Some(&check("MAIN_CHECK", MAIN)));
    let campaign = graph.add_page("page_campaign", Some(&check("CAMPAIGN_CHECK", CAMPAIGN)));
    let stage = graph.add_page("page_stage", Some(&check("STAGE_CHECK", STAGE)));
    graph.link(main, &button("MAIN_GOTO_CAMPAIGN", MAIN_GOTO_CAMPAIGN), campaign).unwrap();
    graph.link(campaign, &button("CAMPAIGN_GOTO_STAGE", CAMPAIGN_GOTO_STAGE), stage).unwrap();
    graph.link(campaign, &back, main).unwrap();
    graph.link(stage, &back, campaign).unwrap();
    Pages {
        graph,
        main,
        campaign,
        stage,
        back,
    }
}

fn navigator(pages: &Pages) -> Navigator {
    Navigator::new(pages.graph.clone()).with_config(color_pages())
}

fn popup() -> Popup {
    let confirm = Arc::new(VisualElement::new("POPUP_CONFIRM", CONFIRM, CONFIRM_COLOR));
    let cancel = Arc::new(VisualElement::new("POPUP_CANCEL", CANCEL, CANCEL_COLOR));
    Popup::new(&confirm, &cancel).with_offset(None)
}

// ========== PageGraph ==========

#[test]
fn test_route_follows_links_backwards() {
    let pages = pages();
    let to_stage = pages.graph.connect(pages.stage);
    assert_eq!(to_stage.destination(), pages.stage);
    assert_eq!(to_stage.next_hop(pages.main), Some(pages.campaign));
    assert_eq!(to_stage.next_hop(pages.campaign), Some(pages.stage));
    assert_eq!(to_stage.next_hop(pages.stage), None);
    assert_eq!(
        to_stage.path(pages.main),
        Some(vec![pages.main, pages.campaign, pages.stage])
    );

    let to_main = pages.graph.connect(pages.main);
    assert_eq!(to_main.next_hop(pages.stage), Some(pages.campaign), "Fresh route, no stale hops");
    assert_eq!(to_main.next_hop(pages.campaign), Some(pages.main));
    assert_eq!(to_main.next_hop(pages.main), None);
}

#[test]
fn test_route_unreachable_and_bad_links() {
    let mut pages = pages();
    let island = pages.graph.add_page("page_island", None);
    let route = pages.graph.connect(pages.main);
    assert!(!route.reaches(island));
    assert_eq!(route.path(island), None);
    assert!(route.reaches(pages.stage));

    let mut other = PageGraph::new();
    let only = other.add_page("page_only", None);
    assert!(other.link(only, &pages.back, pages.stage).is_err(), "Unknown target page");
    assert!(other.link(pages.stage, &pages.back, only).is_err(), "Unknown source page");
    assert_eq!(pages.graph.find("page_campaign"), Some(pages.campaign));
    assert_eq!(pages.graph.find("page_missing"), None);
    assert_eq!(pages.graph.check_elements().len(), 3, "Pages without a check are skipped");
}

// ========== Navigator ==========

#[tokio::test(start_paused = true)]
async fn test_goto_clicks_each_edge_in_order() {
    let pages = pages();
    let mut nav = navigator(&pages);
    let mut driver = driver(game(Game {
        page: Some(MAIN),
        ..Game::default()
    }));

    nav.goto(&mut driver, pages.stage, false).await.unwrap();

    let taps = &driver.channel().taps;
    assert_eq!(taps.len(), 2, "Exactly one click per edge");
    assert!(MAIN_GOTO_CAMPAIGN.contains(taps[0]));
    assert!(CAMPAIGN_GOTO_STAGE.contains(taps[1]));
    assert_eq!(driver.channel().state.page, Some(STAGE));
    assert_eq!(nav.current(), Some(pages.stage));
}

#[tokio::test(start_paused = true)]
async fn test_goto_back_uses_new_route() {
    let pages = pages();
    let mut nav = navigator(&pages);
    let mut driver = driver(game(Game {
        page: Some(MAIN),
        ..Game::default()
    }));

    nav.goto(&mut driver, pages.stage, false).await.unwrap();
    nav.goto(&mut driver, pages.main, false).await.unwrap();

    assert_eq!(driver.channel().state.page, Some(MAIN));
    assert_eq!(driver.channel().taps.len(), 4);
    assert_eq!(driver.channel().taps_in(BACK), 2);
}

#[tokio::test(start_paused = true)]
async fn test_goto_requires_destination_check() {
    let mut pages = pages();
    let nowhere = pages.graph.add_page("page_nowhere", None);
    let mut nav = navigator(&pages);
    let mut driver = driver(game(Game::default()));
    let err = nav.goto(&mut driver, nowhere, false).await.unwrap_err();
    assert!(matches!(err, AutomationError::Configuration { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_get_current_page() {
    let pages = pages();
    let mut nav = navigator(&pages);
    let mut driver = driver(game(Game {
        page: Some(CAMPAIGN),
        ..Game::default()
    }));

    assert_eq!(nav.get_current_page(&mut driver, true).await.unwrap(), pages.campaign);
    assert_eq!(nav.current(), Some(pages.campaign));
    assert_eq!(driver.channel().captures, 1, "Skipping the first screenshot still needs a frame");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_page_times_out() {
    let pages = pages();
    let mut nav = navigator(&pages);
    let mut driver = driver(game(Game::default()));

    let start = Instant::now();
    let err = nav.get_current_page(&mut driver, false).await.unwrap_err();
    assert!(matches!(err, AutomationError::UnknownPage { .. }), "Got {:?}", err);
    assert!(err.requires_takeover());
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert!(driver.channel().taps.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_page_recovers_through_home() {
    let pages = pages();
    let home = Arc::new(VisualElement::new("GOTO_MAIN", HOME, HOME_COLOR));
    let mut nav = navigator(&pages).with_home(&home);
    let mut driver = driver(game(Game {
        home: true,
        ..Game::default()
    }));

    assert_eq!(nav.get_current_page(&mut driver, false).await.unwrap(), pages.main);
    assert_eq!(driver.channel().taps_in(HOME), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ensure_only_moves_when_needed() {
    let pages = pages();
    let mut nav = navigator(&pages);
    let mut driver = driver(game(Game {
        page: Some(STAGE),
        ..Game::default()
    }));

    assert!(!nav.ensure(&mut driver, pages.stage, false).await.unwrap());
    assert!(driver.channel().taps.is_empty());

    assert!(nav.ensure(&mut driver, pages.main, false).await.unwrap());
    assert_eq!(driver.channel().state.page, Some(MAIN));
}

#[tokio::test(start_paused = true)]
async fn test_goto_timeout() {
    let pages = pages();
    let mut nav = navigator(&pages).with_config(NavigatorConfig {
        goto_timeout: Some(Duration::from_secs(5)),
        ..color_pages()
    });
    let mut driver = driver(game(Game::default()));

    let err = nav.goto(&mut driver, pages.stage, false).await.unwrap_err();
    match err {
        AutomationError::NavigationTimeout { destination, duration } => {
            assert_eq!(destination, "page_stage");
            assert!(duration >= Duration::from_secs(5));
        }
        other => panic!("Expected a navigation timeout, got {:?}", other),
    }
}

// ========== Interrupts ==========

#[tokio::test(start_paused = true)]
async fn test_interrupts_drained_during_goto() {
    let pages = pages();
    let mut nav = navigator(&pages).with_interrupts(InterruptChain::new().with(popup()));
    let mut driver = driver(game(Game {
        page: Some(MAIN),
        popup_on_campaign: true,
        ..Game::default()
    }));

    nav.goto(&mut driver, pages.stage, false).await.unwrap();

    let channel = driver.channel();
    assert_eq!(channel.state.page, Some(STAGE));
    assert_eq!(channel.taps.len(), 3);
    assert!(CONFIRM.contains(channel.taps[1]), "Popup dismissed before moving on");
    assert_eq!(channel.taps_in(CANCEL), 0);
}

#[tokio::test(start_paused = true)]
async fn test_popup_needs_both_buttons() {
    let confirm = Arc::new(VisualElement::new("POPUP_CONFIRM", CONFIRM, CONFIRM_COLOR));
    let mut chain = InterruptChain::new()
        .with(InterruptRule::PopupCancel(popup()))
        .with(InterruptRule::appear_then_click(&confirm, Detect::color()));
    assert_eq!(chain.len(), 2);

    // Confirm alone is not a popup, the second rule takes it
    let mut driver = driver(MockDisplay::new((), |_: &()| {
        let mut frame = blank();
        fill(&mut frame, CONFIRM, CONFIRM_COLOR);
        frame
    }));
    driver.screenshot().await.unwrap();
    assert!(chain.handle(&mut driver).await.unwrap());
    assert_eq!(driver.channel().taps_in(CONFIRM), 1);

    let mut driver = self::driver(game(Game {
        popup: true,
        ..Game::default()
    }));
    driver.screenshot().await.unwrap();
    assert!(chain.handle(&mut driver).await.unwrap());
    assert_eq!(driver.channel().taps_in(CANCEL), 1, "First rule wins");
    assert_eq!(driver.channel().taps_in(CONFIRM), 0);
}

fn fleet_rule(limit: u32) -> CountedRule {
    let fleet = Arc::new(VisualElement::new("RESET_FLEET_PREPARATION", FLEET, FLEET_COLOR));
    CountedRule::new(&fleet, limit).with_detect(Detect::color().interval(3.0))
}

#[tokio::test(start_paused = true)]
async fn test_fleet_preparation_requests_takeover() {
    let pages = pages();
    let mut nav = navigator(&pages).with_interrupts(InterruptChain::new().with(fleet_rule(5)));
    let mut driver = driver(game(Game {
        fleet: true,
        ..Game::default()
    }));

    let err = nav.goto(&mut driver, pages.stage, false).await.unwrap_err();
    assert!(matches!(err, AutomationError::RuntimeTakeover { .. }), "Got {:?}", err);
    assert!(err.requires_takeover());
    assert_eq!(driver.channel().taps_in(FLEET), 5, "Stops after the allowed dismissals");
}

#[tokio::test(start_paused = true)]
async fn test_counted_rule_reset() {
    let mut chain = InterruptChain::new().with(fleet_rule(1));
    let mut driver = driver(game(Game {
        fleet: true,
        ..Game::default()
    }));
    driver.screenshot().await.unwrap();
    assert!(chain.handle(&mut driver).await.unwrap());
    assert!(chain.handle(&mut driver).await.is_err());

    chain.reset_counters();
    tokio::time::advance(Duration::from_secs(4)).await;
    assert!(chain.handle(&mut driver).await.unwrap());
    assert_eq!(chain.names(), vec!["RESET_FLEET_PREPARATION (1/1)".to_string()]);
}

// ========== ui_click / ui_back / ensure_index ==========

#[tokio::test(start_paused = true)]
async fn test_ui_click_until_checked() {
    let open = Arc::new(VisualElement::new("OPEN", MAIN_GOTO_CAMPAIGN, CONFIRM_COLOR));
    let panel = Arc::new(VisualElement::new("PANEL", FLEET, FLEET_COLOR));
    let mut driver = driver(
        MockDisplay::new(false, |opened: &bool| {
            let mut frame = blank();
            if *opened {
                fill(&mut frame, FLEET, FLEET_COLOR);
            } else {
                fill(&mut frame, MAIN_GOTO_CAMPAIGN, CONFIRM_COLOR);
            }
            frame
        })
        .on_tap(|opened, point| *opened |= MAIN_GOTO_CAMPAIGN.contains(point)),
    );
    let mut nav = navigator(&pages());

    nav.ui_click(&mut driver, UiClick::new(&open, &panel)).await.unwrap();
    assert!(driver.channel().state);
    assert_eq!(driver.channel().taps.len(), 1);

    let start = Instant::now();
    let request = UiClick::new(&open, Check::element(&panel)).with_additional().confirm_wait(1.0);
    nav.ui_click(&mut driver, request).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(1), "Check held for the confirm wait");
    assert_eq!(driver.channel().taps.len(), 1, "Nothing left to click");
}

#[tokio::test(start_paused = true)]
async fn test_ui_back() {
    let pages = pages();
    let main_check = Arc::clone(pages.graph.page(pages.main).and_then(|p| p.check()).unwrap());
    let mut driver = driver(game(Game {
        page: Some(CAMPAIGN),
        ..Game::default()
    }));

    let mut nav = navigator(&pages);
    let err = nav.ui_back(&mut driver, &main_check, 10.0, false).await.unwrap_err();
    assert!(matches!(err, AutomationError::Configuration { .. }));

    let mut nav = navigator(&pages).with_back(&pages.back);
    nav.ui_back(&mut driver, &main_check, 10.0, false).await.unwrap();
    assert_eq!(driver.channel().state.page, Some(MAIN));
    assert_eq!(driver.channel().taps_in(BACK), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ensure_index() {
    const NEXT: Area = Area { x1: 250, y1: 100, x2: 290, y2: 130 };
    const PREV: Area = Area { x1: 30, y1: 100, x2: 70, y2: 130 };
    let next = VisualElement::new("NEXT", NEXT, Rgb([0, 0, 0]));
    let prev = VisualElement::new("PREV", PREV, Rgb([0, 0, 0]));
    let mut driver = driver(
        MockDisplay::new(1i32, |index: &i32| {
            let mut frame = blank();
            fill(&mut frame, Area::new(0, 0, 4, 4), Rgb([(*index * 10) as u8, 0, 0]));
            frame
        })
        .on_tap(|index, point: Point| {
            if NEXT.contains(point) {
                *index += 1;
            } else if PREV.contains(point) {
                *index -= 1;
            }
        }),
    );
    let reader = |frame: &crate::display::Frame| frame.get_pixel(0, 0)[0] as i32 / 10;
    let mut nav = navigator(&pages());

    nav.ensure_index(&mut driver, 5, reader, &next, &prev, true, Duration::from_millis(250), false)
        .await
        .unwrap();
    assert_eq!(driver.channel().state, 5);
    assert_eq!(driver.channel().taps_in(NEXT), 4, "Fast mode clicks the whole difference");

    nav.ensure_index(&mut driver, 3, reader, &next, &prev, false, Duration::ZERO, false)
        .await
        .unwrap();
    assert_eq!(driver.channel().state, 3);
    assert_eq!(driver.channel().taps_in(PREV), 2);
}

// ========== Story options ==========

const SKIP: Area = Area { x1: 260, y1: 5, x2: 310, y2: 25 };
const SKIP_COLOR: Rgb<u8> = Rgb([90, 90, 200]);
const OPTION_COLOR: Rgb<u8> = Rgb([247, 247, 247]);
const THREE_BANDS: [(i32, i32); 3] = [(30, 80), (100, 150), (170, 220)];
const TWO_BANDS: [(i32, i32); 2] = [(30, 80), (100, 150)];

fn story_config(preferred: usize) -> StoryOptionConfig {
    StoryOptionConfig {
        option_area: Area::new(40, 20, 280, 230),
        detect_area: Area::new(40, 20, 60, 230),
        preferred,
        ..StoryOptionConfig::default()
    }
}

fn options_frame(bands: &[(i32, i32)]) -> crate::display::Frame {
    let mut frame = blank();
    for &(y1, y2) in bands {
        fill(&mut frame, Area::new(40, y1, 280, y2), OPTION_COLOR);
    }
    fill(&mut frame, SKIP, SKIP_COLOR);
    frame
}

#[test]
fn test_three_option_bands() {
    let options = story_options(&options_frame(&THREE_BANDS), &story_config(0));
    let names: Vec<&str> = options.iter().map(|o| o.name()).collect();
    assert_eq!(names, vec!["STORY_OPTION_1_OF_3", "STORY_OPTION_2_OF_3", "STORY_OPTION_3_OF_3"]);
    let areas: Vec<Area> = options.iter().map(|o| o.area()).collect();
    assert_eq!(
        areas,
        vec![
            Area::new(45, 34, 275, 75),
            Area::new(45, 104, 275, 145),
            Area::new(45, 174, 275, 215),
        ]
    );
}

#[test]
fn test_no_options_and_thin_bars() {
    assert!(story_options(&blank(), &story_config(0)).is_empty());
    // Bars thinner than the minimum width are text lines, not options
    let thin = options_frame(&[(40, 60), (120, 140)]);
    assert!(story_options(&thin, &story_config(0)).is_empty());
    let (signal, strip) = option_signal(&thin, &story_config(0));
    assert_eq!(signal.len(), 210);
    assert_eq!(strip.y1, 20);
}

struct Story {
    /// Frames left that show only two of the three options
    partial: Rc<Cell<usize>>,
    chosen: Option<Point>,
}

fn story(partial: usize) -> MockDisplay<Story> {
    MockDisplay::new(
        Story {
            partial: Rc::new(Cell::new(partial)),
            chosen: None,
        },
        |story: &Story| {
            if story.chosen.is_some() {
                return blank();
            }
            let left = story.partial.get();
            if left > 0 {
                story.partial.set(left - 1);
                return options_frame(&TWO_BANDS);
            }
            options_frame(&THREE_BANDS)
        },
    )
    .on_tap(|story, point| {
        if story.chosen.is_none() && Area::new(40, 30, 280, 220).contains(point) {
            story.chosen = Some(point);
        }
    })
}

fn story_handler(preferred: usize) -> StoryHandler {
    let skip = Arc::new(VisualElement::new("STORY_SKIP", SKIP, SKIP_COLOR));
    StoryHandler::new(&skip, &skip)
        .with_offset(None)
        .with_config(story_config(preferred))
}

async fn run_story(
    driver: &mut ActionDriver<MockDisplay<Story>>,
    chain: &mut InterruptChain,
) -> Point {
    for _ in 0..50 {
        driver.screenshot().await.unwrap();
        chain.handle(driver).await.unwrap();
        if let Some(point) = driver.channel().state.chosen {
            return point;
        }
    }
    panic!("No story option was chosen");
}

#[tokio::test(start_paused = true)]
async fn test_story_option_waits_for_stable_count() {
    let mut chain = InterruptChain::new().with(story_handler(1));
    let mut driver = driver(story(2));

    let point = run_story(&mut driver, &mut chain).await;
    assert!(
        Area::new(45, 104, 275, 145).contains(point),
        "Second option of the full layout, got {:?}",
        point
    );
}

#[tokio::test(start_paused = true)]
async fn test_story_option_falls_back_to_first() {
    let mut chain = InterruptChain::new().with(story_handler(7));
    let mut driver = driver(story(0));

    let point = run_story(&mut driver, &mut chain).await;
    assert!(Area::new(45, 34, 275, 75).contains(point), "Got {:?}", point);
}

#[tokio::test(start_paused = true)]
async fn test_story_skip_without_options() {
    let mut handler = story_handler(0);
    let mut driver = driver(MockDisplay::new(true, |showing: &bool| {
        let mut frame = blank();
        if *showing {
            fill(&mut frame, SKIP, SKIP_COLOR);
        }
        frame
    })
    .on_tap(|showing, point| *showing &= !SKIP.contains(point)));

    handler.ensure_no_story(&mut driver, false).await.unwrap();
    assert!(!driver.channel().state);
    assert_eq!(driver.channel().taps_in(SKIP), 1);
}
